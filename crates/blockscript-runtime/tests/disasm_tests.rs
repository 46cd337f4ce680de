//! Disassembly listings for small programs

mod common;

use blockscript_config::CompilerConfig;
use blockscript_runtime::funcallback::create_typed_intrinsic;
use blockscript_runtime::BlockScriptBuilder;
use common::script;

fn builder_with_add() -> BlockScriptBuilder {
    let mut builder = BlockScriptBuilder::new(&CompilerConfig::default());
    create_typed_intrinsic(&mut builder, "add", &["a", "b"], false, |(a, b): (i32, i32)| {
        a.wrapping_add(b)
    })
    .unwrap();
    builder
}

#[test]
fn test_call_through_native() {
    let mut builder = builder_with_add();
    let assembly = builder
        .build("twice(x : int) : int { return add(x, x); }")
        .unwrap();

    insta::assert_snapshot!(assembly.disassemble(), @r###"
    === add(a : int, b : int) : int  [frame 8, native] ===
    0000  native add (#0)
    0001  ret

    === twice(x : int) : int  [frame 12] ===
    0000  load r0, [sbp+0]
    0001  store [sbp+4], r0
    0002  load r0, [sbp+0]
    0003  store [sbp+8], r0
    0004  call add (#0), args @sbp+4
    0005  move r0, ret
    0006  move ret, r0
    0007  ret
    0008  ret
    "###);
}

#[test]
fn test_single_block() {
    let mut builder = builder_with_add();
    let assembly = builder
        .build("neg(x : float) : float { return -x; }")
        .unwrap();

    insta::assert_snapshot!(assembly.disassemble_block(1).unwrap(), @r###"
    === neg(x : float) : float  [frame 4] ===
    0000  load r0, [sbp+0]
    0001  fneg r0, r0
    0002  move ret, r0
    0003  ret
    0004  ret
    "###);
    assert!(assembly.disassemble_block(2).is_none());
}

#[test]
fn test_strings_are_listed() {
    let script = script("hello() : void { printString(\"hi\"); printString(\"hi\"); }");
    let listing = script.assembly().unwrap().disassemble();

    assert!(listing.starts_with("=== Strings ===\n0: \"hi\"\n\n"));
    assert!(listing.contains("=== hello() : void  [frame 8] ==="));
    assert!(listing.contains("call printString (#0), args @sbp+0"));
}
