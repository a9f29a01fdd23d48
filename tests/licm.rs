//! Loop invariant code motion integration tests.
//!
//! Every transformed function is executed with the reference interpreter before and after the
//! pass; output and return value must match.

use tacopt::{
    analysis::{ssa::convert_to_ssa, Analysis},
    compiler::{find_and_optimize_loops, EventKind, PassKind, Pipeline, PipelineConfig},
    emulation::{Interpreter, Value},
    ir::{Function, FunctionBuilder, Instruction, Program},
    Result,
};

fn self_loop() -> Function {
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

fn scaled_sum() -> Function {
    FunctionBuilder::new("scaled_sum")
        .arg("n", "int")
        .arg("k", "int")
        .returns("int")
        .constant("i", 0)
        .constant("sum", 0)
        .jump("loop")
        .label("loop")
        .constant("one", 1)
        .op("mul", "scale", &["k", "k"])
        .op("add", "step", &["scale", "one"])
        .op("add", "sum", &["sum", "step"])
        .op("add", "i", &["i", "one"])
        .op("lt", "c", &["i", "n"])
        .branch("c", "loop", "exit")
        .label("exit")
        .ret(Some("sum"))
        .build()
}

fn guarded_division() -> Function {
    FunctionBuilder::new("guarded_division")
        .arg("d", "int")
        .constant("i", 0)
        .constant("one", 1)
        .constant("three", 3)
        .jump("loop")
        .label("loop")
        .constant("hundred", 100)
        .op("div", "q", &["hundred", "d"])
        .effect("print", &["q"])
        .op("add", "i", &["i", "one"])
        .op("lt", "c", &["i", "three"])
        .branch("c", "loop", "exit")
        .label("exit")
        .ret(None)
        .build()
}

fn nested_loops() -> Function {
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

fn block_of<'a>(function: &'a Function, label: &str) -> &'a [Instruction] {
    let start = function
        .instrs
        .iter()
        .position(|instr| instr.as_label() == Some(label))
        .unwrap();
    let end = function.instrs[start + 1..]
        .iter()
        .position(|instr| instr.as_label().is_some())
        .map_or(function.instrs.len(), |offset| start + 1 + offset);
    &function.instrs[start..end]
}

fn has_const(instrs: &[Instruction], dest: &str) -> bool {
    instrs.iter().any(|instr| {
        instr
            .as_operation()
            .is_some_and(|op| op.is_const() && op.dest.as_deref() == Some(dest))
    })
}

fn behavior(function: &Function, args: &[Value]) -> Result<(Vec<String>, Option<Value>)> {
    let execution = Interpreter::new().run(function, args)?;
    Ok((execution.output, execution.return_value))
}

#[test]
fn test_constant_moves_to_preheader() -> Result<()> {
    let mut function = self_loop();
    let report = find_and_optimize_loops(&mut function, &mut Analysis::new(), 8)?;
    assert_eq!(report.preheaders, vec!["loop_preheader".to_string()]);

    assert!(!has_const(block_of(&function, "loop"), "ten"));
    assert!(has_const(block_of(&function, "loop_preheader"), "ten"));

    let labels: Vec<&str> = function.labels().collect();
    assert_eq!(labels, vec!["loop_preheader", "loop", "exit"]);

    // The entry block now jumps to the preheader.
    let entry_exit = function
        .instrs
        .iter()
        .take_while(|instr| instr.as_label().is_none())
        .last()
        .and_then(Instruction::as_operation)
        .unwrap();
    assert!(entry_exit.is_jump());
    assert_eq!(entry_exit.labels, vec!["loop_preheader".to_string()]);
    Ok(())
}

#[test]
fn test_behavior_is_preserved() -> Result<()> {
    let cases: Vec<(Function, Vec<Value>)> = vec![
        (self_loop(), vec![]),
        (scaled_sum(), vec![Value::Int(4), Value::Int(3)]),
        (scaled_sum(), vec![Value::Int(1), Value::Int(-2)]),
        (guarded_division(), vec![Value::Int(7)]),
        (nested_loops(), vec![]),
    ];

    for (original, args) in cases {
        let expected = behavior(&original, &args)?;
        let mut function = original.clone();
        find_and_optimize_loops(&mut function, &mut Analysis::new(), 16)?;
        assert_eq!(behavior(&function, &args)?, expected, "{}", function.name);
    }
    Ok(())
}

#[test]
fn test_invariant_chain_uses_arguments() -> Result<()> {
    let mut function = scaled_sum();
    let report = find_and_optimize_loops(&mut function, &mut Analysis::new(), 8)?;
    let hoisted: Vec<&str> = report
        .hoisted
        .iter()
        .map(|hoisted| hoisted.instruction.as_str())
        .collect();
    assert_eq!(
        hoisted,
        vec![
            "one: int = const 1;",
            "scale: int = mul k k;",
            "step: int = add scale one;"
        ]
    );
    Ok(())
}

#[test]
fn test_faulting_and_effectful_operations_stay() -> Result<()> {
    let mut function = guarded_division();
    let report = find_and_optimize_loops(&mut function, &mut Analysis::new(), 8)?;
    assert_eq!(report.hoisted.len(), 1);
    assert_eq!(report.hoisted[0].instruction, "hundred: int = const 100;");

    let body = block_of(&function, "loop");
    assert!(body
        .iter()
        .filter_map(Instruction::as_operation)
        .any(|op| op.op == "div"));
    Ok(())
}

#[test]
fn test_licm_on_ssa_form() -> Result<()> {
    let original = scaled_sum();
    let args = [Value::Int(3), Value::Int(2)];
    let expected = behavior(&original, &args)?;

    let mut function = original.clone();
    let mut analysis = Analysis::new();
    convert_to_ssa(&mut function, &mut analysis)?;
    let report = find_and_optimize_loops(&mut function, &mut analysis, 8)?;
    assert!(!report.is_empty());

    // Header phis now come from the preheader instead of the entry block.
    for op in function.instrs.iter().filter_map(Instruction::as_operation) {
        if op.is_phi() {
            assert!(op.labels.contains(&"loop_preheader".to_string()));
        }
    }
    assert_eq!(behavior(&function, &args)?, expected);
    Ok(())
}

#[test]
fn test_optimize_pipeline() -> Result<()> {
    let mut program = Program {
        functions: vec![self_loop(), nested_loops(), scaled_sum()],
    };
    let before = program.clone();

    let pipeline = Pipeline::new(PipelineConfig::optimize());
    assert_eq!(pipeline.config().passes, vec![PassKind::Licm, PassKind::ToSsa]);
    let report = pipeline.run(&mut program)?;
    assert_eq!(report.functions, 3);
    assert_eq!(report.changed_functions.len(), 3);

    let events = pipeline.events();
    assert!(events.count(EventKind::InstructionHoisted) >= 3);
    assert_eq!(events.count(EventKind::PreheaderInserted), 4);

    let interpreter = pipeline.interpreter();
    let args = [Value::Int(2), Value::Int(5)];
    for (old, new) in before.functions.iter().zip(&program.functions) {
        let args = if old.args.is_some() { &args[..] } else { &[] };
        let old_run = interpreter.run(old, args)?;
        let new_run = interpreter.run(new, args)?;
        assert_eq!(old_run.output, new_run.output, "{}", old.name);
        assert_eq!(old_run.return_value, new_run.return_value, "{}", old.name);
    }
    Ok(())
}

#[test]
fn test_hoisted_in_dominance_order_when_layout_differs() -> Result<()> {
    // `tail` is laid out before `loop` but only runs after it.
    let original = FunctionBuilder::new("rotated")
        .constant("i", 0)
        .constant("one", 1)
        .constant("three", 3)
        .jump("loop")
        .label("tail")
        .op("add", "b", &["a", "one"])
        .op("add", "i", &["i", "one"])
        .op("lt", "c", &["i", "three"])
        .branch("c", "loop", "exit")
        .label("loop")
        .constant("a", 5)
        .jump("tail")
        .label("exit")
        .effect("print", &["b"])
        .ret(None)
        .build();
    let expected = behavior(&original, &[])?;

    let mut function = original.clone();
    let report = find_and_optimize_loops(&mut function, &mut Analysis::new(), 8)?;
    let hoisted: Vec<&str> = report
        .hoisted
        .iter()
        .map(|hoisted| hoisted.instruction.as_str())
        .collect();
    assert_eq!(hoisted, vec!["a: int = const 5;", "b: int = add a one;"]);

    let preheader = block_of(&function, "loop_preheader");
    assert!(has_const(preheader, "a"));
    assert_eq!(behavior(&function, &[])?, expected);
    Ok(())
}
