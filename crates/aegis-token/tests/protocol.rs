//! # Token Protocol Scenario Tests
//!
//! | Scenario | Feed | Expected |
//! |----------|------|----------|
//! | Live feed | issuer tokens for 100–109 | every second matches |
//! | Replay | tokens of 105–109 shown from second 110 | first replayed frame flagged |
//! | Loop | 100–102 looped from 103 | flagged at 103 |
//! | Drifting issuer | issuer clock 2 s ahead | matches with offset |
//! | Forged future second | bogus token stamped years ahead | mismatch; genuine feed still judged |
//! | Round trip | issuer text ─▶ parser ─▶ validator | matches |

use aegis_token::{
    parse_watermark, ManualClock, Observation, SecretKey, TokenCheck, TokenConfig,
    TokenValidator, WatermarkIssuer, WatermarkToken,
};
use proptest::prelude::*;

const SECRET: &str = "aegis-test-secret";

fn config() -> TokenConfig {
    TokenConfig::new().with_secret(SECRET)
}

/// What an honest camera would have shown for `seconds`.
fn true_log(seconds: std::ops::Range<i64>) -> Vec<Observation> {
    let key = SecretKey::new(SECRET.as_bytes()).unwrap();
    seconds.map(|t| Observation::new(t, key.token_at(t))).collect()
}

// =============================================================================
// LIVE FEED
// =============================================================================

#[test]
fn test_live_feed_validates() {
    let issuer = WatermarkIssuer::with_clock(&config(), ManualClock::new(100)).unwrap();
    let validator = TokenValidator::new(&config()).unwrap();

    for _ in 100..110 {
        let mark = issuer.issue();
        let obs = Observation::new(mark.unix_second, mark.token);
        assert_eq!(validator.check(&obs), TokenCheck::Match { offset: 0 });
        issuer.clock().advance(1);
    }
}

#[test]
fn test_signature_round_trip() {
    let issuer = WatermarkIssuer::with_clock(&config(), ManualClock::new(1_700_000_000)).unwrap();
    let validator = TokenValidator::new(&config()).unwrap();

    let text = issuer.issue().text;
    let obs = parse_watermark(&format!("[ocr] {text} [end]")).unwrap();
    assert_eq!(obs.unix_second, 1_700_000_000);
    assert!(validator.check(&obs).is_match());
}

#[test]
fn test_drifting_issuer_tolerated() {
    // Issuer runs two seconds fast.
    let issuer = WatermarkIssuer::with_clock(&config(), ManualClock::new(202)).unwrap();
    let validator = TokenValidator::new(&config()).unwrap();
    let token = issuer.current_token();
    assert_eq!(
        validator.check(&Observation::new(200, token)),
        TokenCheck::Match { offset: 2 }
    );
}

// =============================================================================
// REPLAY AND LOOP ATTACKS
// =============================================================================

#[test]
fn test_replay_flagged_on_first_replayed_second() {
    let validator = TokenValidator::new(&config()).unwrap();
    let log = true_log(100..110);

    // Genuine footage up to 109, then 105..109 replayed from 110.
    let mut observed = log.clone();
    for (i, genuine) in log[5..].iter().enumerate() {
        observed.push(Observation::new(110 + i as i64, genuine.token));
    }

    let report = validator.validate_sequence(&observed);
    assert!(report.is_tampered());
    assert_eq!(report.matched, 10);
    let first = report.first_mismatch().unwrap();
    assert_eq!(first.unix_second, 110);
    assert_eq!(first.observed.to_string(), "3581");
    assert_eq!(first.expected.to_string(), "8350");
}

#[test]
fn test_loop_flagged() {
    let validator = TokenValidator::new(&config()).unwrap();
    let clip = true_log(100..103);
    let looped: Vec<Observation> = (0..9)
        .map(|i| Observation::new(100 + i, clip[(i % 3) as usize].token))
        .collect();

    let report = validator.validate_sequence(&looped);
    assert_eq!(report.first_mismatch().map(|m| m.unix_second), Some(103));
}

#[test]
fn test_forged_future_second_keeps_genuine_feed_judged() {
    let validator = TokenValidator::new(&config().with_short_circuit(false)).unwrap();
    let mut observed = true_log(100..103);
    observed.push(Observation::parse(1_000_000_000, "0000").unwrap());
    observed.extend(true_log(103..106));

    let report = validator.validate_sequence(&observed);
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.inconclusive, 0);
    assert_eq!(report.matched, 6);
    assert_eq!(validator.window().newest(), Some(105));
}

#[test]
fn test_strict_mode_rejects_skew() {
    let validator = TokenValidator::new(&config().with_skew_tolerance(0)).unwrap();
    let log = true_log(300..301);
    let shifted = Observation::new(301, log[0].token);
    assert!(validator.check(&shifted).is_mismatch());
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_token_is_four_digits_and_pure(secret in prop::collection::vec(any::<u8>(), 1..64), t in any::<i64>()) {
        let key = SecretKey::new(&secret).unwrap();
        let a = key.token_at(t);
        let b = key.token_at(t);
        prop_assert_eq!(a, b);
        let text = a.to_string();
        prop_assert_eq!(text.len(), 4);
        prop_assert!(text.bytes().all(|c| c.is_ascii_digit()));
        prop_assert_eq!(text.parse::<WatermarkToken>().unwrap(), a);
    }

    #[test]
    fn prop_opacity_schedule(t in -1_000_000_000i64..4_000_000_000i64) {
        let issuer = WatermarkIssuer::with_clock(&config(), ManualClock::new(t)).unwrap();
        let expected = if t.rem_euclid(20) < 10 { 1.0 } else { 0.2 };
        prop_assert_eq!(issuer.issue().opacity, expected);
    }

    #[test]
    fn prop_genuine_feed_always_matches(start in 0i64..2_000_000_000, len in 1usize..40) {
        let validator = TokenValidator::new(&config()).unwrap();
        let log = true_log(start..start + len as i64);
        let report = validator.validate_sequence(&log);
        prop_assert!(!report.is_tampered());
        prop_assert_eq!(report.matched, len);
    }
}
