// Screening workflow agents: catalog, instructions and the hosted reply provider.
// Agent calls go through agent_client only.

pub mod catalog;
pub mod hosted;
pub mod prompts;
