//! End-to-end execution tests through the public facade.

use pretty_assertions::assert_eq;
use spinel::{Error, ErrorKind, Interpreter, Value};

fn run(source: &str) -> Value {
    Interpreter::new().run(source).expect("program should run")
}

fn run_err(source: &str) -> Error {
    Interpreter::new()
        .run(source)
        .expect_err("program should fail")
}

fn kind_of(err: &Error) -> ErrorKind {
    match err {
        Error::Runtime(runtime) => runtime.kind,
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(run("2 + 3").as_int(), Some(5));
    assert_eq!(run("1 + 2 * 3").as_int(), Some(7));
    assert_eq!(run("10 / 4").as_int(), Some(2));
    assert_eq!(run("10 % 3").as_int(), Some(1));
    assert_eq!(run("2 ** 8").as_int(), Some(256));
    assert_eq!(run("2 ** 3 ** 2").as_int(), Some(512));
    assert_eq!(run("-5 + 8").as_int(), Some(3));
    assert_eq!(run("1 + 2.5").as_float(), Some(3.5));
}

#[test]
fn comparisons_and_boolean_operators() {
    assert_eq!(run("5 > 3"), Value::TRUE);
    assert_eq!(run("5 <= 3"), Value::FALSE);
    assert_eq!(run("1 == 1.0"), Value::TRUE);
    assert_eq!(run("3 > 2 && 5 > 3"), Value::TRUE);
    assert_eq!(run("2 > 3 || 5 > 10"), Value::FALSE);
    assert_eq!(run("!true"), Value::FALSE);
    assert_eq!(run("!nil"), Value::TRUE);
}

#[test]
fn true_false_and_nil_are_singletons() {
    assert_eq!(run("true.equal?(true)"), Value::TRUE);
    assert_eq!(run("false.equal?(false)"), Value::TRUE);
    assert_eq!(run("nil.equal?(nil)"), Value::TRUE);
    assert_eq!(run("true.equal?(false)"), Value::FALSE);
}

#[test]
fn while_loop_with_array_length_condition() {
    let source = "
i = 10
a = [1, 2, 3]

while i > a.length do
  i = i - 1
end

i
";
    assert_eq!(run(source).as_int(), Some(3));
}

#[test]
fn postfix_increment_mutates_the_local() {
    let source = "
i = 0

while i < 100 do
  10
  i++
end

i
";
    assert_eq!(run(source).as_int(), Some(100));
}

#[test]
fn next_skips_to_the_loop_test() {
    let source = "
x = 0
y = 0

while x < 10 do
  x = x + 1
  if x == 5
    next
  end
  y = y + 1
end

y
";
    assert_eq!(run(source).as_int(), Some(9));
}

#[test]
fn if_is_an_expression() {
    let source = "
x = 5
if x > 10
  1
elsif x > 3
  2
else
  3
end
";
    assert_eq!(run(source).as_int(), Some(2));
    assert_eq!(run("if false\n1\nend"), Value::Nil);
}

#[test]
fn class_method_via_singleton_def() {
    let source = "
class Foo
  def self.bar
    10
  end
end

Foo.bar
";
    assert_eq!(run(source).as_int(), Some(10));
}

#[test]
fn method_dispatch_walks_the_superclass_chain() {
    let source = "
class Bar
  def bar
    10
  end
end

class Foo < Bar
end

Foo.new.bar
";
    assert_eq!(run(source).as_int(), Some(10));
}

#[test]
fn included_modules_participate_in_lookup() {
    let source = "
module Bar
  def bar
    10
  end
end

class Foo
  include(Bar)
end

Foo.new.bar
";
    assert_eq!(run(source).as_int(), Some(10));
}

#[test]
fn namespaced_classes_resolve_through_constant_chains() {
    let source = "
module Foo
  class Bar
    class Baz
      def bar
        42
      end
    end
  end
end

Foo::Bar::Baz.new.bar
";
    assert_eq!(run(source).as_int(), Some(42));
}

#[test]
fn reopening_a_class_merges_method_tables() {
    let source = "
class C
  def a
    1
  end
end

class C
  def b
    2
  end
end

C.new.a + C.new.b
";
    assert_eq!(run(source).as_int(), Some(3));
}

#[test]
fn superclass_mismatch_on_reopen_is_an_error() {
    let source = "
class A
end
class B
end
class C < A
end
class C < B
end
";
    let err = run_err(source);
    assert_eq!(kind_of(&err), ErrorKind::TypeError);
    assert!(err.to_string().contains("superclass mismatch"));
}

#[test]
fn initialize_runs_on_new_and_ivars_persist() {
    let source = "
class Point
  def initialize(x, y)
    @x = x
    @y = y
  end

  def sum
    @x + @y
  end
end

Point.new(3, 4).sum
";
    assert_eq!(run(source).as_int(), Some(7));
}

#[test]
fn attr_accessor_defines_reader_and_writer() {
    let source = "
class Box
  attr_accessor(:value)
end

b = Box.new
b.value = 5
b.value + 1
";
    assert_eq!(run(source).as_int(), Some(6));
}

#[test]
fn local_reads_never_cross_method_boundaries() {
    let source = "
x = 10

def m
  x
end

m
";
    let err = run_err(source);
    assert_eq!(kind_of(&err), ErrorKind::NoMethodError);
    assert!(err.to_string().contains("Def:Object#m"));
}

#[test]
fn blocks_close_over_the_defining_frame() {
    let source = "
sum = 0
[1, 2, 3].each do |n|
  sum = sum + n
end
sum
";
    assert_eq!(run(source).as_int(), Some(6));
}

#[test]
fn yield_invokes_the_attached_block() {
    let source = "
def twice
  yield(1) + yield(2)
end

twice do |x|
  x * 10
end
";
    assert_eq!(run(source).as_int(), Some(30));
}

#[test]
fn block_parameter_captures_and_calls() {
    let source = "
def apply(&blk)
  blk.call(5)
end

apply do |x|
  x + 1
end
";
    assert_eq!(run(source).as_int(), Some(6));
}

#[test]
fn optional_and_splat_parameters() {
    let source = "
def m(a, b = 10)
  a + b
end

m(1) + m(1, 2)
";
    assert_eq!(run(source).as_int(), Some(14));

    let splat = "
def m(first, *rest)
  rest.length
end

m(1, 2, 3, 4)
";
    assert_eq!(run(splat).as_int(), Some(3));
}

#[test]
fn keyword_parameters_bind_by_name() {
    let source = "
def m(k:, j: 2)
  k + j
end

m(k: 1) + m(k: 1, j: 10)
";
    assert_eq!(run(source).as_int(), Some(14));

    let err = run_err("def m(k:)\nk\nend\nm(1)");
    assert_eq!(kind_of(&err), ErrorKind::ArgumentError);
}

#[test]
fn arity_mismatch_is_an_argument_error() {
    let err = run_err("def m(a)\na\nend\nm(1, 2)");
    assert_eq!(kind_of(&err), ErrorKind::ArgumentError);
    assert!(err.to_string().contains("wrong number of arguments"));
}

#[test]
fn method_missing_receives_the_name() {
    let source = "
class Ghost
  def method_missing(name)
    name.to_s
  end
end

Ghost.new.anything
";
    assert_eq!(run(source).as_str().as_deref(), Some("anything"));
}

#[test]
fn collections_and_ranges() {
    assert_eq!(run("[1, 2, 3].length").as_int(), Some(3));
    assert_eq!(run("a = [1, 2]\na[0] = 9\na[0]").as_int(), Some(9));
    assert_eq!(run("a = []\na.push(1)\na << 2\na.length").as_int(), Some(2));
    assert_eq!(
        run("h = { a: 1, b: 2 }\nh[\"a\"] + h.length").as_int(),
        Some(3)
    );
    assert_eq!(run("h = {}\nh[\"k\"] = 5\nh[\"k\"]").as_int(), Some(5));
    assert_eq!(run("(1..5).to_a.length").as_int(), Some(5));
    assert_eq!(run("(1..4).map do |n|\nn * n\nend.last").as_int(), Some(16));
}

#[test]
fn string_methods() {
    assert_eq!(
        run("\"foo\" + \"bar\"").as_str().as_deref(),
        Some("foobar")
    );
    assert_eq!(run("\"abc\".reverse").as_str().as_deref(), Some("cba"));
    assert_eq!(run("\"hello\".length").as_int(), Some(5));
    assert_eq!(run("\"a-b-c\".split(\"-\").length").as_int(), Some(3));
    assert_eq!(
        run("s = \"ab\"\ns.concat(\"cd\")\ns").as_str().as_deref(),
        Some("abcd")
    );
}

#[test]
fn integer_iteration_reenters_the_interpreter() {
    let source = "
total = 0
3.times do |i|
  total = total + i
end
total
";
    assert_eq!(run(source).as_int(), Some(3));
}

#[test]
fn runtime_error_taxonomy() {
    assert_eq!(kind_of(&run_err("1 / 0")), ErrorKind::ZeroDivisionError);
    assert_eq!(kind_of(&run_err("NoSuchThing")), ErrorKind::NameError);
    assert_eq!(kind_of(&run_err("1.undefined")), ErrorKind::NoMethodError);
    assert_eq!(
        kind_of(&run_err("Boolean.new")),
        ErrorKind::UnsupportedMethodError
    );
    assert_eq!(kind_of(&run_err("1 + \"x\"")), ErrorKind::TypeError);
}

#[test]
fn backtraces_name_the_instruction_set_and_line() {
    let err = run_err("def boom\n1 / 0\nend\nboom");
    let rendered = err.to_string();
    assert!(rendered.contains("ZeroDivisionError"));
    assert!(rendered.contains("from Def:Object#boom:2"));
    assert!(rendered.contains("from ProgramStart:4"));
}

#[test]
fn output_capture_orders_puts_lines() {
    let mut interpreter = Interpreter::new();
    let output = interpreter
        .capture("puts(\"one\")\nputs(\"two\", \"three\")")
        .expect("program should run");
    assert_eq!(output.output, vec!["one", "two", "three"]);
}

#[test]
fn classes_persist_across_runs() {
    let mut interpreter = Interpreter::new();
    interpreter
        .run("class Keeper\ndef keep\n1\nend\nend")
        .expect("definition should run");
    let result = interpreter.run("Keeper.new.keep").expect("call should run");
    assert_eq!(result.as_int(), Some(1));
}

#[test]
fn constant_assignment_and_scoping() {
    assert_eq!(run("LIMIT = 40\nLIMIT + 2").as_int(), Some(42));

    let scoped = "
class Config
  MAX = 9
end

Config::MAX
";
    assert_eq!(run(scoped).as_int(), Some(9));
}

#[test]
fn reflection_helpers() {
    let source = "
module Walkable
end

class Dog
  include(Walkable)
end

Dog.new.is_a?(Walkable)
";
    assert_eq!(run(source), Value::TRUE);
    assert_eq!(run("1.is_a?(Integer)"), Value::TRUE);
    assert_eq!(run("1.is_a?(String)"), Value::FALSE);
    assert_eq!(run("1.respond_to?(:times)"), Value::TRUE);
    assert_eq!(run("\"x\".class.name").as_str().as_deref(), Some("String"));
}

#[test]
fn string_index_and_symbols() {
    assert_eq!(run("\"abc\"[1]").as_str().as_deref(), Some("b"));
    assert_eq!(run("\"abc\"[-1]").as_str().as_deref(), Some("c"));
    assert_eq!(run("\"abc\"[9]"), Value::Nil);
    assert_eq!(run(":sym.to_s").as_str().as_deref(), Some("sym"));
}

#[test]
fn range_membership() {
    assert_eq!(run("(1..5).include?(3)"), Value::TRUE);
    assert_eq!(run("(1..5).include?(9)"), Value::FALSE);
    assert_eq!(run("(1..3).size").as_int(), Some(3));
}

#[test]
fn to_json_capability() {
    assert_eq!(
        run("{ a: 1, b: [2, 3] }.to_json").as_str().as_deref(),
        Some(r#"{"a":1,"b":[2,3]}"#)
    );
    assert_eq!(run("nil.to_json").as_str().as_deref(), Some("null"));
}
