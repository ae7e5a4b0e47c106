/*
    Convergence tests

    Property checks that every replica ends with the same text no matter
    which edits were concurrent or in what order messages were delivered.
*/

use crate::jupiter::wire::{decode_message, encode_message};
use crate::jupiter::{DocumentSession, Operation, Priority, TextDocument, WireFormat, WireMessage};
use crate::test_utils::{
    applied, engine_pair, random_operation, random_text, session_text, test_rng_with_seed, text_session,
    SAMPLE_TEXT,
};
use proptest::prelude::*;
use rand::Rng;
use std::collections::VecDeque;

/// Random document plus two edits generated against it
fn concurrent_edits(seed: u64) -> (String, Operation, Operation) {
    let mut rng = test_rng_with_seed(seed);
    let doc = if rng.random_bool(0.1) { String::new() } else { random_text(&mut rng, 12) };
    let a = random_operation(&mut rng, &doc);
    let b = random_operation(&mut rng, &doc);
    (doc, a, b)
}

/// A chain of edits made at one site, folded into nested splits
fn edit_chain(seed: u64, doc: &str, steps: usize) -> Operation {
    let mut rng = test_rng_with_seed(seed);
    let mut text = doc.to_string();
    let mut chain = Operation::NoOperation;
    for _ in 0..steps {
        let op = random_operation(&mut rng, &text);
        text = applied(&text, &op);
        chain = Operation::split(chain, op);
    }
    chain
}

fn deliver(queue: &mut VecDeque<WireMessage>, session: &DocumentSession<TextDocument>) {
    if let Some(message) = queue.pop_front() {
        match message {
            WireMessage::Request(request) => {
                session.receive(&request).unwrap();
            }
            WireMessage::Acknowledgement(ack) => {
                session.receive_acknowledgement(&ack).unwrap();
            }
        }
    }
}

proptest! {
    // Property: a' applied after b gives the same text as b' applied after a
    #[test]
    fn prop_transformation_converges(seed in any::<u64>()) {
        let (doc, a, b) = concurrent_edits(seed);

        let a_after_b = a.transform(&b, Priority::First);
        let b_after_a = b.transform(&a, Priority::Second);

        let left = applied(&applied(&doc, &a), &b_after_a);
        let right = applied(&applied(&doc, &b), &a_after_b);
        prop_assert_eq!(left, right);
    }

    // Property: composite edits converge against composite edits
    #[test]
    fn prop_split_transformation_converges(
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
        steps_a in 1usize..5,
        steps_b in 1usize..5,
    ) {
        let doc = SAMPLE_TEXT;
        let a = edit_chain(seed_a, doc, steps_a);
        let b = edit_chain(seed_b, doc, steps_b);

        let left = applied(&applied(doc, &a), &b.transform(&a, Priority::Second));
        let right = applied(&applied(doc, &b), &a.transform(&b, Priority::First));
        prop_assert_eq!(left, right);
    }

    // Property: NoOperation is the identity on both sides of a transform
    #[test]
    fn prop_noop_is_identity(seed in any::<u64>()) {
        let (_, a, _) = concurrent_edits(seed);

        prop_assert_eq!(a.transform(&Operation::NoOperation, Priority::First), a.clone());
        prop_assert_eq!(a.transform(&Operation::NoOperation, Priority::Second), a.clone());
        prop_assert_eq!(Operation::NoOperation.transform(&a, Priority::First), Operation::NoOperation);
    }

    // Property: inverse undoes an edit
    #[test]
    fn prop_invert_restores_document(seed in any::<u64>(), steps in 1usize..6) {
        let chain = edit_chain(seed, SAMPLE_TEXT, steps);
        let edited = applied(SAMPLE_TEXT, &chain);
        prop_assert_eq!(applied(&edited, &chain.invert()), SAMPLE_TEXT);
    }

    // Property: both encodings carry nested splits unchanged
    #[test]
    fn prop_wire_preserves_operations(seed in any::<u64>(), steps in 1usize..6) {
        let chain = edit_chain(seed, SAMPLE_TEXT, steps);
        let mut engine = engine_pair().0;
        let message = WireMessage::Request(engine.generate(chain));

        for format in [WireFormat::Json, WireFormat::Binary] {
            let bytes = encode_message(&message, format).unwrap();
            prop_assert_eq!(decode_message(&bytes, format).unwrap(), message.clone());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Property: two sessions converge under random edits, random delivery
    // interleaving and occasional acknowledgements
    #[test]
    fn prop_sessions_converge(seed in any::<u64>(), steps in 1usize..80) {
        let mut rng = test_rng_with_seed(seed);
        let one = text_session(1, 2, SAMPLE_TEXT);
        let two = text_session(2, 1, SAMPLE_TEXT);
        let mut to_one: VecDeque<WireMessage> = VecDeque::new();
        let mut to_two: VecDeque<WireMessage> = VecDeque::new();

        for _ in 0..steps {
            match rng.random_range(0..10) {
                0..=2 => {
                    let op = random_operation(&mut rng, &session_text(&one));
                    to_two.push_back(WireMessage::Request(one.edit(op).unwrap()));
                }
                3..=5 => {
                    let op = random_operation(&mut rng, &session_text(&two));
                    to_one.push_back(WireMessage::Request(two.edit(op).unwrap()));
                }
                6 => deliver(&mut to_one, &one),
                7 => deliver(&mut to_two, &two),
                8 => to_two.push_back(WireMessage::Acknowledgement(one.acknowledgement().unwrap())),
                _ => to_one.push_back(WireMessage::Acknowledgement(two.acknowledgement().unwrap())),
            }
        }

        while !to_one.is_empty() || !to_two.is_empty() {
            deliver(&mut to_one, &one);
            deliver(&mut to_two, &two);
        }

        prop_assert_eq!(session_text(&one), session_text(&two));
        prop_assert_eq!(one.checksum().unwrap(), two.checksum().unwrap());
    }
}

#[test]
fn test_long_session_stays_bounded_with_acknowledgements() {
    let mut rng = test_rng_with_seed(7);
    let one = text_session(1, 2, "");
    let two = text_session(2, 1, "");

    for _ in 0..500 {
        let op = random_operation(&mut rng, &session_text(&one));
        let request = one.edit(op).unwrap();
        two.receive(&request).unwrap();
        let ack = two.acknowledgement().unwrap();
        one.receive_acknowledgement(&ack).unwrap();
    }

    assert_eq!(session_text(&one), session_text(&two));
    assert_eq!(one.with_engine(|e| e.outgoing_len()).unwrap(), 0);
    assert_eq!(two.with_engine(|e| e.incoming_len()).unwrap(), 0);
}
