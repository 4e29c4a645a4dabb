use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashSet};
use utxo_token_cache::{
    BalanceQuery, BalanceResult, ClaimQuery, ClaimRelease, EventHandler, LedgerChange, PoolState,
    RequestContext, SelectionStrategy, Token, TokenCacheError, TokenPoolEvent, TokenPoolKey,
    TokenPoolResponse,
};

fn pool_key() -> TokenPoolKey {
    TokenPoolKey::new("alice", "cash", "issuer", "notary", "USD").unwrap()
}

fn seeded_pool(seed: u64, count: usize) -> PoolState {
    let mut state = PoolState::with_seed(pool_key(), seed);
    let tokens = (0..count)
        .map(|i| Token::new(format!("tx{}:0", i), Decimal::from(i as u64 % 7 + 1)))
        .collect();
    state.complete_backfill(tokens);
    state
}

fn claim(id: &str, target: Decimal, strategy: SelectionStrategy) -> TokenPoolEvent {
    TokenPoolEvent::ClaimQuery(ClaimQuery {
        context: RequestContext::new(id, "flow"),
        pool_key: pool_key(),
        target_amount: target,
        tag_regex: None,
        owner_hash: None,
        strategy: Some(strategy),
    })
}

fn balance(handler: &EventHandler, state: &mut PoolState) -> BalanceResult {
    let query = TokenPoolEvent::BalanceQuery(BalanceQuery {
        context: RequestContext::new("balance", "flow"),
        pool_key: pool_key(),
        tag_regex: None,
        owner_hash: None,
    });
    match handler.handle(state, query).unwrap() {
        TokenPoolResponse::Balance(result) => result,
        other => panic!("unexpected response {:?}", other),
    }
}

#[test]
fn test_random_claims_never_share_tokens() {
    let handler = EventHandler::default();
    let mut state = seeded_pool(42, 60);
    let mut seen = HashSet::new();
    let mut claimed_total = Decimal::ZERO;

    for i in 0..40 {
        let event = claim(&format!("r{}", i), dec!(4), SelectionStrategy::Random);
        match handler.handle(&mut state, event) {
            Ok(TokenPoolResponse::Claimed(result)) => {
                let sum: Decimal = result.tokens.iter().map(|t| t.amount()).sum();
                assert!(sum >= dec!(4));
                for token in &result.tokens {
                    assert!(seen.insert(token.state_ref().to_string()));
                }
                claimed_total += sum;
            }
            Err(TokenCacheError::InsufficientBalance { .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    let result = balance(&handler, &mut state);
    assert_eq!(result.total_balance - result.available_balance, claimed_total);
    assert_eq!(state.claims().claimed_token_count(), seen.len());
}

#[test]
fn test_same_seed_same_selection() {
    let handler = EventHandler::default();
    let picks = |seed| {
        let mut state = seeded_pool(seed, 30);
        match handler
            .handle(&mut state, claim("r1", dec!(10), SelectionStrategy::Random))
            .unwrap()
        {
            TokenPoolResponse::Claimed(result) => result
                .tokens
                .iter()
                .map(|t| t.state_ref().to_string())
                .collect::<Vec<_>>(),
            other => panic!("unexpected response {:?}", other),
        }
    };

    assert_eq!(picks(7), picks(7));
}

#[test]
fn test_full_lifecycle_conserves_value() {
    let handler = EventHandler::new(SelectionStrategy::LargestFirst);
    let mut state = seeded_pool(1, 10);
    let start = balance(&handler, &mut state);
    assert_eq!(start.total_balance, start.available_balance);

    let claimed = match handler
        .handle(&mut state, claim("pay-1", dec!(12), SelectionStrategy::LargestFirst))
        .unwrap()
    {
        TokenPoolResponse::Claimed(result) => result,
        other => panic!("unexpected response {:?}", other),
    };
    let spent: Decimal = claimed.tokens.iter().map(|t| t.amount()).sum();
    let change = spent - dec!(12);

    // Ledger commits: claimed tokens consumed, change output produced
    handler
        .handle(
            &mut state,
            TokenPoolEvent::LedgerChange(LedgerChange {
                context: RequestContext::new("pay-1", "flow"),
                pool_key: pool_key(),
                consumed_tokens: claimed.tokens.clone(),
                produced_tokens: vec![Token::new("change:0", change)],
            }),
        )
        .unwrap();
    assert!(state.claims().is_empty());

    // The requester's release after commit is a no-op apart from spending
    let used: BTreeSet<String> = claimed
        .tokens
        .iter()
        .map(|t| t.state_ref().to_string())
        .collect();
    handler
        .handle(
            &mut state,
            TokenPoolEvent::ClaimRelease(ClaimRelease {
                context: RequestContext::new("pay-1", "flow"),
                pool_key: pool_key(),
                claim_id: "pay-1".to_string(),
                used_tokens: used,
            }),
        )
        .unwrap();

    let end = balance(&handler, &mut state);
    assert_eq!(end.total_balance, start.total_balance - dec!(12));
    assert_eq!(end.available_balance, end.total_balance);
}
