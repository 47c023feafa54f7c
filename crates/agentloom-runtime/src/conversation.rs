//! Linking an agent to a fixed roster of conversational partners.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use agentloom_core::messaging::ToolArgs;
use agentloom_core::tools::{FunctionTool, ToolParameterSchema, ToolSchema};
use serde_json::Value;

use crate::agent::Agent;
use crate::subagent::delegate;

pub const DEFAULT_INTERACTION_NAME: &str = "ask";

/// One utterance exchanged through a linked interaction tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

pub type ConversationCallback = Arc<dyn Fn(ConversationMessage) + Send + Sync>;

#[derive(Clone)]
pub struct LinkOptions {
    /// Name of the tool registered on the actor
    pub interaction_name: String,
    /// When set, partners are addressed as `"{prefix} {index}"` instead of
    /// by their names
    pub anonymize_prefix: Option<String>,
    /// Invoked with the request before and the response after each exchange
    pub callback: Option<ConversationCallback>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            interaction_name: DEFAULT_INTERACTION_NAME.to_string(),
            anonymize_prefix: None,
            callback: None,
        }
    }
}

impl LinkOptions {
    pub fn with_interaction_name(mut self, name: impl Into<String>) -> Self {
        self.interaction_name = name.into();
        self
    }

    pub fn with_anonymize_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.anonymize_prefix = Some(prefix.into());
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ConversationMessage) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

/// Registration made by [`link_agents`]
#[derive(Debug)]
pub struct LinkHandle {
    actor: Arc<Agent>,
    tool: String,
    partners: Vec<String>,
}

impl LinkHandle {
    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    /// Names under which the actor addresses its partners
    pub fn partner_names(&self) -> &[String] {
        &self.partners
    }

    /// Remove the interaction tool from the actor
    pub fn unlink(self) -> bool {
        self.actor.remove_tool(&self.tool).is_some()
    }
}

/// Let `actor` talk to `partners` through a single tool.
///
/// With one partner the tool takes just a `request`; with several it also
/// takes the `user` to address, and an unknown user fails with the list of
/// valid names. Each exchange runs the partner's full turn and returns
/// `"{user}: {response}"` to the actor. Like sub-agent tools, the interaction
/// tool refers to partners weakly.
pub fn link_agents(actor: &Arc<Agent>, partners: &[Arc<Agent>], options: LinkOptions) -> LinkHandle {
    let LinkOptions {
        interaction_name,
        anonymize_prefix,
        callback,
    } = options;

    let roster: Vec<(String, Weak<Agent>)> = partners
        .iter()
        .enumerate()
        .map(|(index, partner)| {
            let name = match &anonymize_prefix {
                Some(prefix) => format!("{prefix} {index}"),
                None => partner.name().to_string(),
            };
            (name, Arc::downgrade(partner))
        })
        .collect();
    let names: Vec<String> = roster.iter().map(|(name, _)| name.clone()).collect();
    let single = roster.len() == 1;

    let mut properties = HashMap::new();
    properties.insert(
        "request".to_string(),
        ToolParameterSchema::string("What to say to the user"),
    );
    let mut required = vec!["request".to_string()];
    let description = if single {
        "Interact with the user in this conversation using this tool".to_string()
    } else {
        properties.insert(
            "user".to_string(),
            ToolParameterSchema::string("Name of the user to interact with"),
        );
        required.insert(0, "user".to_string());
        let quoted: Vec<String> = names.iter().map(|name| format!("\"{name}\"")).collect();
        format!(
            "Interact with one of the users in this conversation {}",
            quoted.join(", ")
        )
    };
    let schema = ToolSchema::new(
        interaction_name.clone(),
        description,
        ToolParameterSchema::object("", properties, required),
    )
    .with_return_type("string");

    let actor_name = actor.name().to_string();
    let roster = Arc::new(roster);
    let tool = FunctionTool::new(schema, move |args: ToolArgs| {
        let roster = roster.clone();
        let callback = callback.clone();
        let actor_name = actor_name.clone();
        async move {
            let request = string_arg(&args, "request")?;
            let (user, partner) = if single {
                roster[0].clone()
            } else {
                let user = string_arg(&args, "user")?;
                roster
                    .iter()
                    .find(|(name, _)| *name == user)
                    .cloned()
                    .ok_or_else(|| {
                        let available: Vec<&str> =
                            roster.iter().map(|(name, _)| name.as_str()).collect();
                        anyhow::anyhow!(
                            "User \"{user}\" not found, available users: {}",
                            available.join(", ")
                        )
                    })?
            };
            let partner = partner
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("User \"{user}\" is no longer available"))?;

            if let Some(callback) = &callback {
                callback(ConversationMessage {
                    sender: actor_name.clone(),
                    receiver: partner.name().to_string(),
                    content: request.clone(),
                });
            }
            let response = delegate(&partner, request).await?;
            if let Some(callback) = &callback {
                callback(ConversationMessage {
                    sender: partner.name().to_string(),
                    receiver: actor_name.clone(),
                    content: response.clone(),
                });
            }
            Ok(Value::String(format!("{user}: {response}")))
        }
    });

    tracing::debug!(actor = %actor.name(), tool = %interaction_name, partners = ?names, "linking agents");
    actor.add_tool(Arc::new(tool));
    LinkHandle {
        actor: actor.clone(),
        tool: interaction_name,
        partners: names,
    }
}

fn string_arg(args: &ToolArgs, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("missing required string argument '{key}'"))
}
