pub mod diagnose;
pub mod extract;
pub mod planner;
