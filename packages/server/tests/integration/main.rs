
mod clubs;
mod contest;
mod events;
mod users;
