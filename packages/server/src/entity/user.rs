use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "coordinator")]
    Coordinator,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "faculty")]
    Faculty,
    #[sea_orm(string_value = "cosa")]
    Cosa,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Coordinator => "coordinator",
            UserRole::Admin => "admin",
            UserRole::Faculty => "faculty",
            UserRole::Cosa => "cosa",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,
    pub full_name: String,
    #[sea_orm(unique)]
    pub student_id: String,
    pub role: UserRole,
    pub batch: String,

    /// Derived: always the sum of this user's `present` attendance points.
    pub total_points: i64,

    pub photo_url: Option<String>,
    /// Absent for accounts created through the federated login flow.
    pub password_hash: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::club_member::Entity")]
    ClubMemberships,
    #[sea_orm(has_many = "super::team_member::Entity")]
    TeamMemberships,
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
}

impl Related<super::club_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClubMemberships.def()
    }
}

impl Related<super::team_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeamMemberships.def()
    }
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
