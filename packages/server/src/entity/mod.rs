pub mod attendance;
pub mod club;
pub mod club_coordinator;
pub mod club_member;
pub mod contest;
pub mod contest_log;
pub mod event;
pub mod event_club;
pub mod password_reset;
pub mod role_permission;
pub mod team;
pub mod team_member;
pub mod user;
