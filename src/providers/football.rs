pub mod client;
pub mod types;

pub use client::FootballApi;
pub use types::{
    Country, Fixture, FixtureQuery, HeadToHead, League, Player, StandingRow, Team,
};
