pub mod data;
pub mod defaults;
pub mod io;
pub mod orchestrator;
pub mod printing;

#[cfg(test)]
pub mod tests;
