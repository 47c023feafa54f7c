//! Groups of agents wired together by delegation edges.

use std::sync::Arc;

use agentloom_core::error::{AgentError, AgentResult};

use crate::agent::Agent;

/// Kind of edge between two team members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    /// The first member may delegate tasks to the second
    Delegation,
}

#[derive(Debug, Default)]
pub struct Team {
    members: Vec<Arc<Agent>>,
    connections: Vec<(Arc<Agent>, Connection, Arc<Agent>)>,
}

impl Team {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[Arc<Agent>] {
        &self.members
    }

    pub fn is_member(&self, agent: &Arc<Agent>) -> bool {
        self.members.iter().any(|member| Arc::ptr_eq(member, agent))
    }

    pub fn add_member(&mut self, agent: Arc<Agent>) {
        if !self.is_member(&agent) {
            self.members.push(agent);
        }
    }

    /// Record an edge, adding both ends as members when needed.
    ///
    /// A delegation edge registers `to` as a sub-agent of `from`.
    pub fn add_connection(&mut self, from: &Arc<Agent>, connection: Connection, to: &Arc<Agent>) {
        self.add_member(from.clone());
        self.add_member(to.clone());
        match connection {
            Connection::Delegation => {
                from.add_sub_agent(to);
            }
        }
        self.connections.push((from.clone(), connection, to.clone()));
    }

    /// `(from, connection, to)` names in insertion order
    pub fn connections(&self) -> Vec<(String, Connection, String)> {
        self.connections
            .iter()
            .map(|(from, connection, to)| (from.name().to_string(), *connection, to.name().to_string()))
            .collect()
    }

    /// Start the team by sending `prompt` to the entry agent; returns its reply.
    pub async fn kickoff(&self, start: &Arc<Agent>, prompt: impl Into<String>) -> AgentResult<String> {
        if !self.is_member(start) {
            return Err(AgentError::UnknownMember(start.name().to_string()));
        }
        tracing::info!(entry = %start.name(), members = self.members.len(), "team kickoff");
        start.chat(prompt).await
    }
}
