#![no_main]

use jupiter_core::jupiter::{Operation, Priority};
use libfuzzer_sys::fuzz_target;

/// Turn two bytes into an edit that fits `doc`
fn edit(doc: &str, kind: u8, at: u8, len: u8) -> Operation {
    let chars = doc.chars().count();
    let pos = at as usize % (chars + 1);
    if kind % 2 == 0 || pos == chars {
        Operation::insert(pos, "ab".repeat(1 + len as usize % 3))
    } else {
        let count = 1 + len as usize % (chars - pos);
        Operation::delete(pos, doc.chars().skip(pos).take(count).collect::<String>())
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }
    let doc = "héllo wörld, 字 text";
    let a = edit(doc, data[0], data[1], data[2]);
    let b = edit(doc, data[3], data[4], data[5]);

    let mut left = doc.to_string();
    a.apply(&mut left).expect("a fits");
    b.transform(&a, Priority::Second).apply(&mut left).expect("b' fits after a");

    let mut right = doc.to_string();
    b.apply(&mut right).expect("b fits");
    a.transform(&b, Priority::First).apply(&mut right).expect("a' fits after b");

    assert_eq!(left, right);
});
