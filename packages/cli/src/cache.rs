use std::collections::BTreeMap;
use std::path::PathBuf;

use cu::pre::*;
use dashmap::DashMap;

use demangler::{Node, demangle_itanium, demangle_msvc, render};

/// Which mangling scheme the inputs use. Nothing is auto-detected; the
/// caller picks the scheme up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MangleFormat {
    Itanium,
    Msvc,
}

impl MangleFormat {
    /// Whether `symbol` carries this scheme's mangle prefix
    fn matches(&self, symbol: &str) -> bool {
        match self {
            Self::Itanium => symbol.starts_with("_Z") || symbol.starts_with("__Z"),
            Self::Msvc => symbol.starts_with('?') || symbol.starts_with("@?"),
        }
    }
}

/// Demangler front-end with a symbol cache, optionally persisted as JSON
pub struct Demangler {
    format: MangleFormat,
    cache: DashMap<String, String>,
    cache_path: Option<PathBuf>,
}

impl Demangler {
    pub fn try_new(format: MangleFormat, cache_path: Option<PathBuf>) -> cu::Result<Self> {
        let cache = match &cache_path {
            Some(path) => match cu::fs::reader(path) {
                Ok(x) => match json::read::<DashMap<String, String>>(x) {
                    Ok(x) => x,
                    Err(e) => {
                        cu::warn!("failed to load demangle cache: {e}");
                        Default::default()
                    }
                },
                Err(_) => Default::default(),
            },
            None => Default::default(),
        };
        Ok(Self {
            format,
            cache,
            cache_path,
        })
    }

    /// Demangle to text. Symbols without the scheme's mangle prefix and
    /// symbols that do not parse come back unchanged; symbols using an
    /// unsupported construct are errors.
    pub fn demangle(&self, symbol: &str) -> cu::Result<String> {
        if !self.format.matches(symbol) {
            return Ok(symbol.to_owned());
        }
        if let Some(x) = self.cache.get(symbol) {
            return Ok(x.to_owned());
        }

        let output = match self.demangle_ast(symbol)? {
            Some(ast) => render(&ast),
            None => symbol.to_owned(),
        };
        self.cache.insert(symbol.to_string(), output.clone());
        Ok(output)
    }

    /// Demangle to a tree, bypassing the text cache
    pub fn demangle_ast(&self, symbol: &str) -> cu::Result<Option<Node>> {
        match self.format {
            MangleFormat::Itanium => cu::check!(
                demangle_itanium(symbol),
                "failed to demangle '{symbol}'"
            ),
            MangleFormat::Msvc => {
                cu::check!(demangle_msvc(symbol), "failed to demangle '{symbol}'")
            }
        }
    }

    /// Write the cache back out, when a cache file is configured
    pub fn flush_cache(&self) -> cu::Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let mut ordered = BTreeMap::new();
        ordered.extend(self.cache.clone());
        let cache_string = json::stringify_pretty(&ordered)?;
        cu::fs::write(path, cache_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprefixed_symbols_pass_through() -> cu::Result<()> {
        let demangler = Demangler::try_new(MangleFormat::Itanium, None)?;
        assert_eq!(demangler.demangle("main")?, "main");
        assert_eq!(demangler.demangle("?msvc@@3HA")?, "?msvc@@3HA");
        Ok(())
    }

    #[test]
    fn test_demangle_and_cache() -> cu::Result<()> {
        let demangler = Demangler::try_new(MangleFormat::Itanium, None)?;
        assert_eq!(demangler.demangle("_ZN3foo3barEv")?, "foo::bar()");
        // second call hits the cache
        assert_eq!(demangler.demangle("_ZN3foo3barEv")?, "foo::bar()");
        Ok(())
    }

    #[test]
    fn test_msvc_format() -> cu::Result<()> {
        let demangler = Demangler::try_new(MangleFormat::Msvc, None)?;
        assert_eq!(demangler.demangle("?foo@@YAHXZ")?, "foo");
        assert_eq!(demangler.demangle("_Z3foov")?, "_Z3foov");
        Ok(())
    }
}
