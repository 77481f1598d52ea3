//! Agent catalog: the four hosted agents of the screening workflow.

use serde::Serialize;

use crate::agents::prompts::{
    CRITIC_INSTRUCTIONS, JOB_POSTING_INSTRUCTIONS, RECRUITER_INSTRUCTIONS,
    SCREENING_INSTRUCTIONS,
};

pub const JOB_POSTING_AGENT: &str = "JobPosting_agent";
pub const SCREENING_AGENT: &str = "CandidateScreening_agent";
pub const RECRUITER_AGENT: &str = "recruiter";
pub const CRITIC_AGENT: &str = "workflow";

/// Participants of the group chat, in turn order.
pub const CONVERSATION_ROSTER: [&str; 2] = [RECRUITER_AGENT, CRITIC_AGENT];

#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub instructions: &'static str,
    pub temperature: Option<f32>,
    pub tools: &'static [&'static str],
}

static CATALOG: [AgentProfile; 4] = [
    AgentProfile {
        name: JOB_POSTING_AGENT,
        description: "Analyzes job postings and requirements",
        instructions: JOB_POSTING_INSTRUCTIONS,
        temperature: None,
        tools: &["file_search"],
    },
    AgentProfile {
        name: SCREENING_AGENT,
        description: "Evaluates candidate resumes against job requirements",
        instructions: SCREENING_INSTRUCTIONS,
        temperature: None,
        tools: &["file_search"],
    },
    AgentProfile {
        name: RECRUITER_AGENT,
        description: "Orchestrates the recruitment workflow",
        instructions: RECRUITER_INSTRUCTIONS,
        temperature: Some(0.1),
        tools: &[
            "connected_agent.JobPosting_agent",
            "connected_agent.CandidateScreening_agent",
        ],
    },
    AgentProfile {
        name: CRITIC_AGENT,
        description: "Guides and critiques the recruitment process",
        instructions: CRITIC_INSTRUCTIONS,
        temperature: Some(0.1),
        tools: &[],
    },
];

pub fn all() -> &'static [AgentProfile] {
    &CATALOG
}

pub fn find(name: &str) -> Option<&'static AgentProfile> {
    CATALOG.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_members_are_in_catalog() {
        for name in CONVERSATION_ROSTER {
            assert!(find(name).is_some(), "{name} missing from catalog");
        }
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<&str> = all().iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn test_critic_is_told_to_emit_sentinel() {
        let critic = find(CRITIC_AGENT).unwrap();
        assert!(critic
            .instructions
            .contains(crate::orchestration::manager::COMPLETION_SENTINEL));
    }

    #[test]
    fn test_unknown_agent_is_not_found() {
        assert!(find("hiring_manager").is_none());
    }

    #[test]
    fn test_profile_serialization_hides_instructions() {
        let json = serde_json::to_value(find(RECRUITER_AGENT).unwrap()).unwrap();
        assert!(json.get("instructions").is_none());
        assert_eq!(json["tools"].as_array().unwrap().len(), 2);
    }
}
