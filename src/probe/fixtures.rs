//! Captured compiler output used as conformance fixtures.
//!
//! Both fixtures are the stderr of a syntax-only pass over the kind probe
//! for `size_t`, `puts`, `EOF`, `nosuch` (indices 0..4).

/// stderr of gcc 12 for the probe of `size_t`, `puts`, `EOF`, `nosuch`.
pub const GCC_FIXTURE: &str = "\
<stdin>: In function '__cgo__f__':
cgo-test:1:1: warning: useless type name in empty declaration
cgo-enum:1:17: error: expected expression before 'size_t'
cgo-test:2:1: warning: statement with no effect [-Wunused-value]
cgo-enum:2:24: error: enumerator value for '__cgo_enum__1' is not an integer constant
cgo-test:3:1: warning: statement with no effect [-Wunused-value]
cgo-test:4:1: error: 'nosuch' undeclared (first use in this function)
cgo-test:4:1: note: each undeclared identifier is reported only once for each function it appears in
";

/// stderr of clang 15 for the same probe.
pub const CLANG_FIXTURE: &str = "\
cgo-test:1:1: warning: declaration does not declare anything [-Wmissing-declarations]
size_t;
^~~~~~
cgo-enum:1:17: error: unexpected type name 'size_t': expected expression
cgo-test:2:1: warning: expression result unused [-Wunused-value]
cgo-enum:2:24: error: expression is not an integer constant expression
cgo-test:3:1: warning: expression result unused [-Wunused-value]
cgo-test:4:1: error: use of undeclared identifier 'nosuch'
";
