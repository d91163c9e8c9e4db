use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub description: Option<String>,
    pub rating: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::club_member::Entity")]
    Members,
    #[sea_orm(has_many = "super::club_coordinator::Entity")]
    Coordinators,
}

impl Related<super::club_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::club_coordinator::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coordinators.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
