use ethers::types::U256;

/// Discrete lifecycle states a proposal can be reported in.
///
/// Quorum, turnout and support thresholds are plugin business rules and are
/// deliberately not part of this classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalStatus {
    Pending,
    Active,
    Succeeded,
    Executed,
    Defeated,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Active => "Active",
            ProposalStatus::Succeeded => "Succeeded",
            ProposalStatus::Executed => "Executed",
            ProposalStatus::Defeated => "Defeated",
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voting window of a proposal, unix timestamps in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProposalTiming {
    pub start_date: u64,
    pub end_date: u64,
}

/// Vote counts at query time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProposalTally {
    pub yes: U256,
    pub no: U256,
    pub abstain: U256,
}

/// Maps temporal bounds, tally and the executed flag to a status. Pure; a tie
/// resolves to `Defeated`.
pub fn resolve(
    now: u64,
    start_date: u64,
    end_date: u64,
    executed: bool,
    yes: U256,
    no: U256,
) -> ProposalStatus {
    if now < start_date {
        ProposalStatus::Pending
    } else if now < end_date {
        ProposalStatus::Active
    } else if executed {
        ProposalStatus::Executed
    } else if yes > no {
        ProposalStatus::Succeeded
    } else {
        ProposalStatus::Defeated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(value: u64) -> U256 {
        U256::from(value)
    }

    #[test]
    fn ended_proposal_with_majority_succeeds() {
        let now = 1_000_000;
        assert_eq!(
            resolve(now, now - 100, now - 1, false, u(10), u(3)),
            ProposalStatus::Succeeded
        );
        assert_eq!(
            resolve(now, now - 100, now - 1, false, u(3), u(10)),
            ProposalStatus::Defeated
        );
        assert_eq!(
            resolve(now, now - 100, now - 1, false, u(5), u(5)),
            ProposalStatus::Defeated
        );
    }

    #[test]
    fn executed_flag_wins_after_the_window() {
        let now = 500;
        assert_eq!(
            resolve(now, 100, 200, true, u(0), u(9)),
            ProposalStatus::Executed
        );
    }

    #[test]
    fn window_bounds_classify_pending_and_active() {
        assert_eq!(
            resolve(99, 100, 200, false, u(1), u(0)),
            ProposalStatus::Pending
        );
        assert_eq!(
            resolve(100, 100, 200, false, u(1), u(0)),
            ProposalStatus::Active
        );
        assert_eq!(
            resolve(199, 100, 200, false, u(1), u(0)),
            ProposalStatus::Active
        );
    }

    #[test]
    fn status_is_monotonic_in_time() {
        let (start, end) = (100u64, 200u64);
        let order = |status: ProposalStatus| match status {
            ProposalStatus::Pending => 0,
            ProposalStatus::Active => 1,
            ProposalStatus::Succeeded | ProposalStatus::Executed | ProposalStatus::Defeated => 2,
        };
        for (executed, yes, no) in [
            (false, u(10), u(3)),
            (false, u(3), u(10)),
            (true, u(1), u(1)),
        ] {
            let mut previous = 0;
            for now in 0..300 {
                let rank = order(resolve(now, start, end, executed, yes, no));
                assert!(rank >= previous, "status moved backwards at t={now}");
                previous = rank;
            }
        }
    }
}
