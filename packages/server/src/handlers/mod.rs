pub mod attendance;
pub mod auth;
pub mod club;
pub mod contest;
pub mod event;
pub mod leaderboard;
pub mod team;
pub mod user;
