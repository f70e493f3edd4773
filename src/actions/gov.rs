//! Governance module: proposals, deposits and votes.

use serde::{Deserialize, Serialize};

use super::{
    format_coins, ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Coin, Params,
    PreparedCall,
};
use crate::client::{Operation, OperationArgs, QueryOperation, TxOperation};

const VOTE_OPTIONS: &[&str] = &["yes", "no", "abstain", "no_with_veto"];

const PROPOSAL_STATUSES: &[&str] = &["deposit_period", "voting_period", "passed", "rejected", "failed"];

pub struct SubmitProposal {
    title: String,
    description: String,
    proposal_type: String,
    deposit: Vec<Coin>,
    from: String,
}

impl Operation for SubmitProposal {
    const DOMAIN: &'static str = "gov";
    const OPERATION: &'static str = "submit-legacy-proposal";

    fn args(&self) -> OperationArgs {
        let deposit = (!self.deposit.is_empty()).then(|| format_coins(&self.deposit));
        OperationArgs::new()
            .flag("title", &self.title)
            .flag("description", &self.description)
            .flag("type", &self.proposal_type)
            .flag_opt("deposit", deposit)
    }
}

impl TxOperation for SubmitProposal {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Deposit {
    proposal_id: u64,
    deposit: Vec<Coin>,
    from: String,
}

impl Operation for Deposit {
    const DOMAIN: &'static str = "gov";
    const OPERATION: &'static str = "deposit";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(self.proposal_id.to_string()).arg(format_coins(&self.deposit))
    }
}

impl TxOperation for Deposit {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Vote {
    proposal_id: u64,
    option: String,
    from: String,
}

impl Operation for Vote {
    const DOMAIN: &'static str = "gov";
    const OPERATION: &'static str = "vote";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(self.proposal_id.to_string()).arg(&self.option)
    }
}

impl TxOperation for Vote {
    fn signer(&self) -> &str {
        &self.from
    }
}

/// Proposal record. Only the fields playbooks commonly read are typed;
/// the rest is kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(alias = "proposal_id")]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProposalResponse {
    Wrapped { proposal: Proposal },
    Bare(Proposal),
}

pub struct ProposalQuery {
    proposal_id: u64,
}

impl Operation for ProposalQuery {
    const DOMAIN: &'static str = "gov";
    const OPERATION: &'static str = "proposal";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(self.proposal_id.to_string())
    }
}

impl QueryOperation for ProposalQuery {
    type Response = ProposalResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        let proposal = match response {
            ProposalResponse::Wrapped { proposal } | ProposalResponse::Bare(proposal) => proposal,
        };
        Some(proposal.status.clone())
    }
}

pub struct Proposals {
    status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalsResponse {
    #[serde(default)]
    pub proposals: Vec<Proposal>,
}

impl Operation for Proposals {
    const DOMAIN: &'static str = "gov";
    const OPERATION: &'static str = "proposals";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().flag_opt("status", self.status.as_deref())
    }
}

impl QueryOperation for Proposals {
    type Response = ProposalsResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.proposals.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(","))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tally {
    #[serde(alias = "yes")]
    pub yes_count: String,
    #[serde(alias = "no")]
    pub no_count: String,
    #[serde(alias = "abstain")]
    pub abstain_count: String,
    #[serde(alias = "no_with_veto")]
    pub no_with_veto_count: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TallyResponse {
    Wrapped { tally: Tally },
    Bare(Tally),
}

pub struct TallyQuery {
    proposal_id: u64,
}

impl Operation for TallyQuery {
    const DOMAIN: &'static str = "gov";
    const OPERATION: &'static str = "tally";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(self.proposal_id.to_string())
    }
}

impl QueryOperation for TallyQuery {
    type Response = TallyResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        let tally = match response {
            TallyResponse::Wrapped { tally } | TallyResponse::Bare(tally) => tally,
        };
        Some(tally.yes_count.clone())
    }
}

fn submit_proposal(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = SubmitProposal {
        title: params.required_string("title")?,
        description: params.required_string("description")?,
        proposal_type: params.optional_string("type")?.unwrap_or_else(|| "Text".to_string()),
        deposit: params.optional_coins("deposit")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn deposit(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Deposit {
        proposal_id: params.required_u64("proposal_id")?,
        deposit: params.required_coins("deposit")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn vote(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let proposal_id = params.required_u64("proposal_id")?;
    let option = params.required("option")?.to_lowercase();
    if !VOTE_OPTIONS.contains(&option.as_str()) {
        return Err(ActionError::invalid(
            "option",
            format!("'{option}' is not one of {}", VOTE_OPTIONS.join(", ")),
        ));
    }
    let request = Vote { proposal_id, option, from: params.signer(env.default_signer.as_deref())? };
    Ok(PreparedCall::submit(&request))
}

fn proposals(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let status = params.optional("status")?.map(str::to_lowercase);
    if let Some(ref status) = status {
        if !PROPOSAL_STATUSES.contains(&status.as_str()) {
            return Err(ActionError::invalid(
                "status",
                format!("'{status}' is not one of {}", PROPOSAL_STATUSES.join(", ")),
            ));
        }
    }
    Ok(PreparedCall::query(&Proposals { status }))
}

fn proposal(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = ProposalQuery { proposal_id: params.required_u64("proposal_id")? };
    Ok(PreparedCall::query(&request))
}

fn tally(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = TallyQuery { proposal_id: params.required_u64("proposal_id")? };
    Ok(PreparedCall::query(&request))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::{Query, Transaction};

    registry.register(ActionSpec::new(
        "gov",
        "submit-proposal",
        Transaction,
        "Submit a governance proposal",
        &["title", "description"],
        &["from", "type", "deposit"],
        submit_proposal,
    ));
    registry.register(ActionSpec::new(
        "gov",
        "deposit",
        Transaction,
        "Deposit tokens on a proposal",
        &["proposal_id", "deposit"],
        &["from"],
        deposit,
    ));
    registry.register(ActionSpec::new(
        "gov",
        "vote",
        Transaction,
        "Vote on a proposal",
        &["proposal_id", "option"],
        &["from"],
        vote,
    ));
    registry.register(ActionSpec::new(
        "gov",
        "proposals",
        Query,
        "List proposals",
        &[],
        &["status"],
        proposals,
    ));
    registry.register(ActionSpec::new(
        "gov",
        "proposal",
        Query,
        "Show one proposal",
        &["proposal_id"],
        &[],
        proposal,
    ));
    registry.register(ActionSpec::new(
        "gov",
        "tally",
        Query,
        "Current tally of a proposal",
        &["proposal_id"],
        &[],
        tally,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_options() {
        let env = ActionEnv { default_signer: Some("alice".to_string()) };

        let ok = Params::from_pairs([("proposal_id", "3"), ("option", "No_With_Veto")]);
        let call = vote(&ok, &env).unwrap();
        assert_eq!(call.args.positional, vec!["3", "no_with_veto"]);

        let bad = Params::from_pairs([("proposal_id", "3"), ("option", "maybe")]);
        assert!(matches!(vote(&bad, &env), Err(ActionError::InvalidParameter { .. })));
    }

    #[test]
    fn test_submit_proposal_defaults_to_text() {
        let params = Params::from_pairs([
            ("title", "Raise limit"),
            ("description", "More blocks"),
            ("deposit", "10ukex"),
            ("from", "alice"),
        ]);
        let call = submit_proposal(&params, &ActionEnv::default()).unwrap();

        assert_eq!(call.args.flags.get("type").map(String::as_str), Some("Text"));
        assert_eq!(call.args.flags.get("deposit").map(String::as_str), Some("10ukex"));
    }

    #[test]
    fn test_proposal_response_keeps_unknown_fields() {
        let response: ProposalResponse = serde_json::from_value(serde_json::json!({
            "proposal": {"id": "7", "status": "PROPOSAL_STATUS_VOTING_PERIOD", "title": "t"}
        }))
        .unwrap();

        assert_eq!(
            ProposalQuery::primary(&response).as_deref(),
            Some("PROPOSAL_STATUS_VOTING_PERIOD")
        );
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["proposal"]["title"], "t");
    }
}
