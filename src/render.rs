//! Rust source emission.
//!
//! Renders resolved blocks and unions into accessor source text. Types are
//! always emitted; every function is gated on the selected name set, so a
//! pruned run only prints the definitions its corpus actually calls. Output
//! order is declaration order, blocks first, then unions, making the text
//! byte-for-byte reproducible for a given input.
//!
//! The generated functions follow a fixed shape: one `impl` block per
//! function, `#[inline(always)]`, `debug_assert!` contracts on every writer
//! and constructor argument, and raw-pointer variants that wrap each word
//! access in its own `unsafe` block.

use crate::codegen::{self, FieldAccess, FieldInit, Shift, TagStep};
use crate::layout::{Base, Block, Field};
use crate::names::Selection;
use crate::union::TaggedUnion;

const HEADER: &str = "#![allow(bad_style, unused_parens)]\n";

pub fn render(blocks: &[Block], unions: &[TaggedUnion], names: &Selection) -> String {
    let mut r = Renderer {
        out: String::from(HEADER),
        names,
    };
    for block in blocks {
        r.block(block);
    }
    for union in unions {
        r.union_(union, blocks);
    }
    r.out
}

fn op(dir: Shift) -> &'static str {
    match dir {
        Shift::Left => "<<",
        Shift::Right => ">>",
    }
}

fn lit(value: u64, base: &Base) -> String {
    format!("{:#x}{}", value, base.suffix())
}

struct Renderer<'a> {
    out: String,
    names: &'a Selection,
}

impl Renderer<'_> {
    /// Append a definition only when its derived name was selected.
    fn emit_named(&mut self, name: &str, text: String) {
        if self.names.contains(name) {
            self.out.push('\n');
            self.out.push_str(&text);
            self.out.push('\n');
        }
    }

    fn emit(&mut self, text: String) {
        self.out.push('\n');
        self.out.push_str(&text);
        self.out.push('\n');
    }

    fn type_def(&mut self, name: &str, base: &Base, words: u64) {
        self.emit(format!(
            "#[repr(C)] pub struct {name} {{\n    words: [{ty}; {words}],\n}}",
            ty = base.word_type(),
        ));
    }

    /// The `(if negative { high_bits } else { 0 })` side of a writer or
    /// constructor contract, collapsed to `0` when no extension applies.
    fn contract_expected(value: &str, base: &Base, high_bits: u64, extend_bit: u64) -> String {
        if high_bits == 0 {
            "0".to_string()
        } else {
            format!(
                "(if 0 != ({value} & (1{suf} << {extend_bit})) {{ {high_bits:#x} }} else {{ 0 }})",
                suf = base.suffix(),
            )
        }
    }

    /// Constructor statements for one field: override assert plus the OR into
    /// the target word. `target` is the lvalue prefix (`b` or `(*b_ptr)`),
    /// `value` the argument expression; pointer variants wrap in `unsafe`.
    fn init_lines(
        lines: &mut Vec<String>,
        base: &Base,
        p: &FieldInit,
        target: &str,
        value: &str,
        raw: bool,
    ) {
        let (open, close) = if raw { ("unsafe { ", " }") } else { ("", "") };
        let or = match p.mask {
            Some(mask) => {
                lines.push("        /* fail if user has passed bits that we will override */".to_string());
                lines.push(format!(
                    "        debug_assert!(({value} & !{mask}) == {expected});",
                    mask = lit(mask, base),
                    expected = Self::contract_expected(value, base, p.high_bits, p.extend_bit),
                ));
                format!(
                    "{target}.words[{i}] |= ({value} & {mask}) {op} {shift}",
                    i = p.index,
                    mask = lit(mask, base),
                    op = op(p.dir),
                    shift = p.shift,
                )
            }
            None => format!(
                "{target}.words[{i}] |= {value} {op} {shift}",
                i = p.index,
                op = op(p.dir),
                shift = p.shift,
            ),
        };
        lines.push(format!("        {open}{or}{close};"));
    }

    /// `new` and `ptr_new` for a block, or for one union variant when `tag`
    /// carries the union and the variant name.
    fn constructors(&mut self, block: &Block, tag: Option<(&TaggedUnion, &str)>) {
        let base = &block.base;
        let ty = base.word_type();
        let (type_name, prefix, fn_prefix) = match tag {
            None => (block.name.as_str(), block.name.clone(), String::new()),
            Some((u, variant)) => (
                u.name.as_str(),
                format!("{}_{}", u.name, variant),
                format!("{}_", block.name),
            ),
        };

        let args: Vec<String> = block
            .visible_order
            .iter()
            .filter(|f| tag.is_none_or(|(u, _)| **f != u.tag_name))
            .map(|f| format!("{f}: {ty}"))
            .collect();
        let args = args.join(", ");

        // Value expression per field: the argument, or the tag constant.
        let value_of = |field: &Field| match tag {
            Some((u, variant)) if field.name == u.tag_name => {
                format!("({u}Tag::{u}_{variant} as {ty})", u = u.name)
            }
            _ => field.name.clone(),
        };

        let mut inits = Vec::new();
        let mut ptr_inits = Vec::new();
        for i in 0..block.words {
            ptr_inits.push(format!("        unsafe {{ (*{type_name}_ptr).words[{i}] = 0 }};"));
        }
        for field in &block.fields {
            let p = codegen::field_init(base, field);
            let value = value_of(field);
            Self::init_lines(&mut inits, base, &p, type_name, &value, false);
            Self::init_lines(
                &mut ptr_inits,
                base,
                &p,
                &format!("(*{type_name}_ptr)"),
                &value,
                true,
            );
        }

        self.emit_named(
            &format!("{prefix}_new"),
            format!(
                "impl {type_name} {{\n    #[inline(always)]\n    \
                 pub fn {fn_prefix}new({args}) -> {type_name} {{\n        \
                 let mut {type_name} = {type_name} {{ words: [0; {words}] }};\n\n\
                 {inits}\n\n        {type_name}\n    }}\n}}",
                words = block.words,
                inits = inits.join("\n"),
            ),
        );

        let ptr_args = if args.is_empty() {
            format!("{type_name}_ptr: *mut {type_name}")
        } else {
            format!("{type_name}_ptr: *mut {type_name}, {args}")
        };
        self.emit_named(
            &format!("{prefix}_ptr_new"),
            format!(
                "impl {type_name} {{\n    #[inline(always)]\n    \
                 pub fn {fn_prefix}ptr_new({ptr_args}) {{\n{inits}\n    }}\n}}",
                inits = ptr_inits.join("\n"),
            ),
        );
    }

    /// Reader, writer and pointer writer for one field. `tag_assert` is an
    /// optional statement checking the union discriminant first.
    fn accessors(
        &mut self,
        type_name: &str,
        base: &Base,
        field: &Field,
        prefix: &str,
        fn_prefix: &str,
        tag_assert: Option<&str>,
    ) {
        let ty = base.word_type();
        let p: FieldAccess = codegen::field_access(base, field);
        let mask = lit(p.mask, base);
        let assert = tag_assert.map(|a| format!("        {a}\n")).unwrap_or_default();

        let read = format!(
            "(self.words[{i}] & {mask}) {op} {shift}",
            i = p.index,
            op = op(p.read),
            shift = p.shift,
        );
        let reader_body = if p.sign_extend {
            format!(
                "        let mut ret = {read};\n        \
                 /* Possibly sign extend */\n        \
                 if 0 != (ret & (1{suf} << {bit})) {{\n            \
                 ret |= {high:#x};\n        }}\n        ret",
                suf = base.suffix(),
                bit = p.extend_bit,
                high = p.high_bits,
            )
        } else {
            format!("        {read}")
        };
        self.emit_named(
            &format!("{prefix}_get_{f}", f = field.name),
            format!(
                "impl {type_name} {{\n    #[inline(always)]\n    \
                 pub fn {fn_prefix}get_{f}(&self) -> {ty} {{\n{assert}{reader_body}\n    }}\n}}",
                f = field.name,
            ),
        );

        let contract = format!(
            "        /* fail if user has passed bits that we will override */\n        \
             debug_assert!(((!{mask} {op} {shift}) & v) == {expected});",
            op = op(p.read),
            shift = p.shift,
            expected = Self::contract_expected("v", base, p.high_bits, p.extend_bit),
        );
        self.emit_named(
            &format!("{prefix}_set_{f}", f = field.name),
            format!(
                "impl {type_name} {{\n    #[inline(always)]\n    \
                 pub fn {fn_prefix}set_{f}(&mut self, v: {ty}) {{\n{assert}{contract}\n        \
                 self.words[{i}] &= !{mask};\n        \
                 self.words[{i}] |= (v {wop} {shift}) & {mask};\n    }}\n}}",
                f = field.name,
                i = p.index,
                wop = op(p.write),
                shift = p.shift,
            ),
        );

        self.emit_named(
            &format!("{prefix}_ptr_set_{f}", f = field.name),
            format!(
                "impl {type_name} {{\n    #[inline(always)]\n    \
                 pub fn {fn_prefix}ptr_set_{f}({type_name}_ptr: *mut {type_name}, v: {ty}) {{\n\
                 {contract}\n        \
                 unsafe {{ (*{type_name}_ptr).words[{i}] &= !{mask} }};\n        \
                 unsafe {{ (*{type_name}_ptr).words[{i}] |= (v {wop} {shift}) & {mask} }};\n    }}\n}}",
                f = field.name,
                i = p.index,
                wop = op(p.write),
                shift = p.shift,
            ),
        );
    }

    fn block(&mut self, block: &Block) {
        // Variant blocks are rendered under their union.
        if block.tagged {
            return;
        }
        self.type_def(&block.name, &block.base, block.words);
        self.constructors(block, None);
        let prefix = block.name.clone();
        for field in &block.fields {
            self.accessors(&block.name, &block.base, field, &prefix, "", None);
        }
    }

    fn union_(&mut self, union: &TaggedUnion, blocks: &[Block]) {
        let base = &union.base;
        let ty = base.word_type();
        self.type_def(&union.name, base, union.words);

        // Discriminant enum, one constant per variant.
        let mut variants = Vec::new();
        for v in &union.variants {
            variants.push(format!("    {u}_{n} = {val},", u = union.name, n = v.name, val = v.value));
        }
        self.emit(format!(
            "#[repr({ty})]\npub enum {u}Tag {{\n{variants}\n}}",
            u = union.name,
            variants = variants.join("\n"),
        ));

        let steps = codegen::tag_cascade(union);
        self.tag_reader(union, ty, &steps);
        self.tag_eq_reader(union, ty, &steps);

        for v in &union.variants {
            let block = &blocks[v.block];
            let prefix = format!("{}_{}", union.name, block.name);
            self.constructors(block, Some((union, v.name.as_str())));

            // The variant's own tag field locates the discriminant for the
            // guard asserts on its accessors.
            let tag_field = block
                .field(&union.tag_name)
                .expect("resolved variant has its tag field");
            let guard = format!(
                "debug_assert!(((self.words[{i}] >> {shift}) & {mask}) == ({u}Tag::{u}_{n} as {ty}));",
                i = tag_field.offset / base.width,
                shift = tag_field.offset % base.width,
                mask = lit(((1u128 << tag_field.size) - 1) as u64, base),
                u = union.name,
                n = v.name,
            );
            for field in &block.fields {
                if field.name == union.tag_name {
                    continue;
                }
                self.accessors(
                    &union.name,
                    base,
                    field,
                    &prefix,
                    &format!("{}_", block.name),
                    Some(&guard),
                );
            }
        }
    }

    fn tag_reader(&mut self, union: &TaggedUnion, ty: &str, steps: &[TagStep]) {
        let mut body = Vec::new();
        for step in &steps[..steps.len() - 1] {
            body.push(format!(
                "        if (self.words[{i}] & {cm}) != {cm} {{\n            \
                 return (self.words[{i}] >> {shift}) & {mask};\n        }}",
                i = step.index,
                cm = lit(step.classmask, &union.base),
                shift = step.shift,
                mask = lit(step.mask, &union.base),
            ));
        }
        let last = steps.last().expect("cascade has a final step");
        body.push(format!(
            "        (self.words[{i}] >> {shift}) & {mask}",
            i = last.index,
            shift = last.shift,
            mask = lit(last.mask, &union.base),
        ));
        self.emit_named(
            &format!("{u}_get_{t}", u = union.name, t = union.tag_name),
            format!(
                "impl {u} {{\n    #[inline(always)]\n    \
                 pub fn get_{t}(&self) -> {ty} {{\n{body}\n    }}\n}}",
                u = union.name,
                t = union.tag_name,
                body = body.join("\n"),
            ),
        );
    }

    fn tag_eq_reader(&mut self, union: &TaggedUnion, ty: &str, steps: &[TagStep]) {
        let arg = format!("{}_type_tag", union.name);
        let mut body = Vec::new();
        for step in &steps[..steps.len() - 1] {
            body.push(format!(
                "        if ({arg} & {cm}) != {cm} {{\n            \
                 return ((self.words[{i}] >> {shift}) & {mask}) == {arg};\n        }}",
                i = step.index,
                cm = lit(step.classmask, &union.base),
                shift = step.shift,
                mask = lit(step.mask, &union.base),
            ));
        }
        let last = steps.last().expect("cascade has a final step");
        body.push(format!(
            "        ((self.words[{i}] >> {shift}) & {mask}) == {arg}",
            i = last.index,
            shift = last.shift,
            mask = lit(last.mask, &union.base),
        ));
        self.emit_named(
            &format!("{u}_{t}_equals", u = union.name, t = union.tag_name),
            format!(
                "impl {u} {{\n    #[inline(always)]\n    \
                 pub fn {t}_equals(&self, {arg}: {ty}) -> bool {{\n{body}\n    }}\n}}",
                u = union.name,
                t = union.tag_name,
                body = body.join("\n"),
            ),
        );
    }
}
