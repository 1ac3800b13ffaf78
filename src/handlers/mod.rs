// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (session + tenant) → Elevated (static HQ key)
pub mod elevated;
pub mod protected;
pub mod public;
