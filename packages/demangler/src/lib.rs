//! Decoders for mangled C++ symbol names.
//!
//! Two schemes are covered: the Itanium ABI encoding used by GCC, Clang, and
//! most ELF toolchains ([`demangle_itanium`]), and the Visual C++ encoding
//! ([`demangle_msvc`], names and operator codes only). Both produce the same
//! [`Node`] tree, which [`render`] prints back as readable C++.
//!
//! Scheme selection is up to the caller; nothing here guesses a format, and
//! nothing here touches files or the environment. Each call parses with its
//! own cursor and substitution table, so parses are independent.

mod cursor;
pub use cursor::*;
mod node;
pub use node::*;
mod itanium;
pub use itanium::*;
mod msvc;
pub use msvc::*;

/// Print a demangled tree in its canonical text form.
///
/// This is `Display` on [`Node`]; rendering never mutates the tree.
pub fn render(ast: &Node) -> String {
    ast.to_string()
}
