//! Shared fixtures for unit tests.

use crate::ir::{Function, FunctionBuilder};

/// `entry -> b1 -> b2` without branches.
pub fn linear() -> Function {
    FunctionBuilder::new("linear")
        .constant("a", 1)
        .label("b1")
        .op("add", "b", &["a", "a"])
        .label("b2")
        .effect("print", &["b"])
        .ret(None)
        .build()
}

/// `entry` branches to `left` / `right`, both define `x` and jump to `join`.
pub fn diamond() -> Function {
    FunctionBuilder::new("diamond")
        .returns("int")
        .constant_bool("c", true)
        .branch("c", "left", "right")
        .label("left")
        .constant("x", 1)
        .jump("join")
        .label("right")
        .constant("x", 2)
        .jump("join")
        .label("join")
        .ret(Some("x"))
        .build()
}

/// `entry -> loop -> loop / exit` with `ten = const 10` inside the loop.
pub fn self_loop() -> Function {
    FunctionBuilder::new("self_loop")
        .constant("i", 0)
        .constant("one", 1)
        .jump("loop")
        .label("loop")
        .constant("ten", 10)
        .op("add", "i", &["i", "one"])
        .op("lt", "c", &["i", "ten"])
        .branch("c", "loop", "exit")
        .label("exit")
        .effect("print", &["i"])
        .ret(None)
        .build()
}

/// A loop testing its condition at the header, so the body may never run.
pub fn while_loop() -> Function {
    FunctionBuilder::new("while_loop")
        .constant("i", 0)
        .constant("one", 1)
        .constant("n", 3)
        .jump("head")
        .label("head")
        .op("lt", "c", &["i", "n"])
        .branch("c", "body", "exit")
        .label("body")
        .constant("ten", 10)
        .op("add", "i", &["i", "one"])
        .jump("head")
        .label("exit")
        .effect("print", &["i"])
        .ret(None)
        .build()
}

/// Two nested do-while loops; `four` is invariant in both.
pub fn nested_loops() -> Function {
    FunctionBuilder::new("nested_loops")
        .returns("int")
        .constant("i", 0)
        .constant("one", 1)
        .constant("three", 3)
        .constant("total", 0)
        .jump("outer")
        .label("outer")
        .constant("j", 0)
        .jump("inner")
        .label("inner")
        .constant("four", 4)
        .op("add", "total", &["total", "four"])
        .op("add", "j", &["j", "one"])
        .op("lt", "more", &["j", "three"])
        .branch("more", "inner", "next")
        .label("next")
        .op("add", "i", &["i", "one"])
        .op("lt", "again", &["i", "three"])
        .branch("again", "outer", "done")
        .label("done")
        .effect("print", &["total"])
        .ret(Some("total"))
        .build()
}
