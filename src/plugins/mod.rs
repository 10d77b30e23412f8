//! Plugins bundle site customisations behind one name.
//!
//! A plugin only touches the public extension points of [`Site`]: formats,
//! engines, preprocessors, processors and generators.
//!
//! ```rust,ignore
//! struct Minify;
//!
//! impl Plugin for Minify {
//!     fn name(&self) -> &str {
//!         "minify"
//!     }
//!
//!     fn install(&self, site: &mut Site) {
//!         site.process(ExtFilter::exts(&[".html"]), |page| {
//!             page.rendered = page.rendered.trim().to_string();
//!             Ok(())
//!         });
//!     }
//! }
//! ```

pub mod multilanguage;

use crate::site::Site;

pub use self::multilanguage::Multilanguage;

pub trait Plugin {
    fn name(&self) -> &str;

    /// Register the plugin's hooks, formats, engines or generators.
    fn install(&self, site: &mut Site);
}
