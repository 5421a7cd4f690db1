//! Interpreter threads: shared object graph, private call stacks.

use pretty_assertions::assert_eq;
use spinel::{Interpreter, Value};

#[test]
fn spawned_thread_mutates_shared_objects() {
    let source = "
a = []
t = thread do
  a.push(1)
  a.push(2)
end
t.join
a.length
";
    let result = Interpreter::new().run(source).expect("program should run");
    assert_eq!(result.as_int(), Some(2));
}

#[test]
fn thread_returns_a_joinable_handle() {
    let source = "
t = thread do
  1
end
t.join
t.join
";
    // The second join is a no-op, not an error.
    let result = Interpreter::new().run(source).expect("program should run");
    assert!(matches!(result, Value::Thread(_)));
}

#[test]
fn threads_share_classes_defined_before_spawn() {
    let source = "
class Adder
  def add(a, b)
    a + b
  end
end

results = []
t = thread do
  results.push(Adder.new.add(2, 3))
end
t.join
results.first
";
    let result = Interpreter::new().run(source).expect("program should run");
    assert_eq!(result.as_int(), Some(5));
}

#[test]
fn multiple_threads_join_independently() {
    let source = "
a = []
t1 = thread do
  a.push(1)
end
t2 = thread do
  a.push(1)
end
t1.join
t2.join
a.length
";
    let result = Interpreter::new().run(source).expect("program should run");
    assert_eq!(result.as_int(), Some(2));
}

#[test]
fn thread_output_reaches_the_shared_sink() {
    let source = "
t = thread do
  puts(\"from thread\")
end
t.join
";
    let mut interpreter = Interpreter::new();
    let output = interpreter.capture(source).expect("program should run");
    assert_eq!(output.output, vec!["from thread"]);
}

#[test]
fn unhandled_thread_errors_terminate_only_that_thread() {
    let source = "
t = thread do
  1 / 0
end
t.join
42
";
    let mut interpreter = Interpreter::new();
    let output = interpreter.capture(source).expect("main thread should survive");
    assert_eq!(output.value.as_int(), Some(42));
    assert!(
        output
            .output
            .iter()
            .any(|line| line.contains("ZeroDivisionError")),
        "the thread's backtrace should reach the sink: {:?}",
        output.output
    );
}

#[test]
fn sleep_suspends_without_failing() {
    let result = Interpreter::new()
        .run("sleep(0)\n1")
        .expect("program should run");
    assert_eq!(result.as_int(), Some(1));
}
