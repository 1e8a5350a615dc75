//! End-to-end tests: description text in, generated accessor source out.

use bitgen::{generate, Error};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper to check that the generated source contains expected patterns.
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

fn generate_all(text: &str) -> String {
    generate(text, &[]).unwrap_or_else(|e| panic!("generation failed: {e}"))
}

const CAP: &str = "\
base 32

block cap {
    field ptr 28
    field tag 4
}
";

#[test]
fn simple_block_accessors() {
    init_logging();
    let output = generate_all(CAP);

    check_output_contains(
        &output,
        &[
            "#![allow(bad_style, unused_parens)]",
            "#[repr(C)] pub struct cap {\n    words: [u32; 1],\n}",
            "pub fn new(ptr: u32, tag: u32) -> cap",
            "let mut cap = cap { words: [0; 1] };",
            "pub fn get_ptr(&self) -> u32",
            "(self.words[0] & 0xfffffff0u32) >> 4",
            "pub fn set_tag(&mut self, v: u32)",
            "/* fail if user has passed bits that we will override */",
            "debug_assert!(((!0xfu32 >> 0) & v) == 0);",
            "self.words[0] &= !0xfu32;",
            "self.words[0] |= (v << 0) & 0xfu32;",
            "pub fn ptr_new(cap_ptr: *mut cap, ptr: u32, tag: u32)",
            "unsafe { (*cap_ptr).words[0] = 0 };",
            "pub fn ptr_set_ptr(cap_ptr: *mut cap, v: u32)",
            "#[inline(always)]",
        ],
    );
}

#[test]
fn multi_word_block_indexes_words() {
    init_logging();
    let output = generate_all(
        "base 32\n\
         block pair {\n\
             field hi 32\n\
             field lo 32\n\
         }",
    );

    check_output_contains(
        &output,
        &[
            "words: [u32; 2]",
            // Full-word fields carry no mask or contract.
            "pair.words[1] |= hi << 0;",
            "pair.words[0] |= lo << 0;",
        ],
    );
}

#[test]
fn high_field_sign_extension_branch() {
    init_logging();
    let output = generate_all(
        "base 64(39,1)\n\
         block vspace {\n\
             padding 34\n\
             field_high addr 20\n\
             padding 10\n\
         }",
    );

    check_output_contains(
        &output,
        &[
            "pub fn get_addr(&self) -> u64",
            "let mut ret = (self.words[0] & 0x3ffffc00u64) << 9;",
            "/* Possibly sign extend */",
            "if 0 != (ret & (1u64 << 38)) {",
            "ret |= 0xffffff8000000000;",
            // Writer contract checks the extended form.
            "(if 0 != (v & (1u64 << 38)) { 0xffffff8000000000 } else { 0 })",
        ],
    );
}

#[test]
fn high_field_above_logical_width_swaps_shift() {
    init_logging();
    // logical width 8 in a 32-bit word: a high field at offset 12 shifts the
    // other way (reader right, writer left).
    let output = generate_all(
        "base 32(8,0)\n\
         block io {\n\
             padding 16\n\
             field_high port 4\n\
             padding 12\n\
         }",
    );

    check_output_contains(
        &output,
        &[
            "(self.words[0] & 0xf000u32) >> 8",
            "self.words[0] |= (v << 8) & 0xf000u32;",
        ],
    );
}

#[test]
fn visible_order_controls_constructor_arguments() {
    init_logging();
    let output = generate_all(
        "base 8\n\
         block pixel (g, r) {\n\
             field r 4\n\
             field g 4\n\
         }",
    );
    check_output_contains(&output, &["pub fn new(g: u8, r: u8) -> pixel"]);
}

const MSG: &str = "\
base 32

-- 4-bit tags escape to 8-bit ones through the 0xc pattern.
block small {
    padding 20
    field payload 8
    field kind 4
}

block wide {
    padding 16
    field payload 8
    field kind 8
}

tagged_union msg kind {
    mask 4 0xc
    mask 8 0xc

    tag small 1
    tag wide 0x5c
}
";

#[test]
fn tagged_union_output() {
    init_logging();
    let output = generate_all(MSG);

    check_output_contains(
        &output,
        &[
            "#[repr(C)] pub struct msg {\n    words: [u32; 1],\n}",
            "#[repr(u32)]\npub enum msgTag {\n    msg_small = 1,\n    msg_wide = 92,\n}",
            // Decode cascade, narrowest width first, widest unconditional.
            "pub fn get_kind(&self) -> u32",
            "if (self.words[0] & 0xcu32) != 0xcu32 {",
            "return (self.words[0] >> 0) & 0xfu32;",
            "(self.words[0] >> 0) & 0xffu32",
            // The equality test cascades on the caller's value.
            "pub fn kind_equals(&self, msg_type_tag: u32) -> bool",
            "if (msg_type_tag & 0xcu32) != 0xcu32 {",
            "return ((self.words[0] >> 0) & 0xfu32) == msg_type_tag;",
            // Variant constructors inject the tag constant.
            "pub fn small_new(payload: u32) -> msg",
            "msg.words[0] |= ((msgTag::msg_small as u32) & 0xfu32) << 0;",
            "pub fn wide_new(payload: u32) -> msg",
            // Variant accessors guard on the discriminant.
            "pub fn wide_get_payload(&self) -> u32",
            "debug_assert!(((self.words[0] >> 0) & 0xffu32) == (msgTag::msg_wide as u32));",
            "pub fn small_ptr_new(msg_ptr: *mut msg, payload: u32)",
        ],
    );

    // Variant blocks get no standalone type or accessors.
    assert!(!output.contains("pub struct small"));
    assert!(!output.contains("pub struct wide"));
    assert!(!output.contains("impl small"));
}

#[test]
fn pruning_selects_only_used_names() {
    init_logging();
    let corpus = vec![
        "void f(void) { x = cap_get_ptr(c); }".to_string(),
        "cap_ptr_set_tag(&c, 3);".to_string(),
    ];
    let output = generate(CAP, &corpus).unwrap();

    check_output_contains(
        &output,
        &[
            "pub struct cap",
            "pub fn get_ptr",
            "pub fn ptr_set_tag",
        ],
    );
    assert!(!output.contains("pub fn set_ptr"));
    assert!(!output.contains("pub fn get_tag"));
    assert!(!output.contains("pub fn new"));
}

#[test]
fn pruning_respects_token_boundaries() {
    init_logging();
    // cap_get_ptr appears only inside a longer identifier.
    let corpus = vec!["my_cap_get_ptr_wrapper();".to_string()];
    let output = generate(CAP, &corpus).unwrap();
    assert!(!output.contains("pub fn get_ptr"));
}

#[test]
fn output_is_deterministic() {
    init_logging();
    let text = format!("{CAP}\n{MSG}");
    // Same input, byte-identical output, repeatedly.
    let first = generate_all(&text);
    for _ in 0..3 {
        assert_eq!(first, generate_all(&text));
    }
}

#[test]
fn comments_and_radix_literals_accepted() {
    init_logging();
    let output = generate_all(
        "# hash comment\n\
         base 32 -- trailing comment\n\
         block b {\n\
             padding 0x10\n\
             field octal 010\n\
             field bin 0b100L\n\
             field rest 0o4\n\
         }",
    );
    check_output_contains(&output, &["pub fn get_octal", "pub fn get_bin", "pub fn get_rest"]);
}

#[test]
fn layout_errors_are_reported() {
    init_logging();
    let err = generate("base 8\nblock b { field f 12 }", &[]).unwrap_err();
    assert!(matches!(err, Error::SizeNotWordMultiple { .. }));

    let err = generate(
        "base 8\nblock b { padding 4 field f 8 padding 4 }",
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, Error::FieldCrossesBoundary { .. }));
}

#[test]
fn union_consistency_errors_are_reported() {
    init_logging();
    // A 4-bit tag value matching its own escape mask can never decode.
    let err = generate(
        "base 32\n\
         block small { padding 20 field payload 8 field kind 4 }\n\
         block wide { padding 16 field payload 8 field kind 8 }\n\
         tagged_union msg kind {\n\
             mask 4 0xc\n\
             mask 8 0xc\n\
             tag small 0xd\n\
             tag wide 0x5c\n\
         }",
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, Error::TagValueEscapesClass { .. }));

    let message = err.to_string();
    assert!(message.contains("msg"), "unhelpful message: {message}");
}

#[test]
fn syntax_errors_name_the_offending_token() {
    init_logging();
    let err = generate("base 32\nblock b { field }", &[]).unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("syntax error") || message.contains("unexpected"),
        "unhelpful message: {message}"
    );
}
