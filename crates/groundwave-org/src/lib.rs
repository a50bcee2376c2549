//! org-mode support for groundwave zettels.
//!
//! this crate turns org documents into html and pulls the metadata the
//! zettelkasten index needs out of them:
//! - [`parse_to_html`]: render an org body, rewriting `id:` links
//! - [`annotate_external_links`]: mark off-site anchors in rendered html
//! - directive helpers ([`extract_id`], [`extract_title`], ...)

mod directives;
mod error;
mod html;
mod links;

pub use directives::{
    Access, extract_access, extract_date_directive, extract_id, extract_id_links, extract_title,
    is_home_access, is_public_access, validate_uuid,
};
pub use error::OrgError;
pub use html::{escape_html, parse_to_html};
pub use links::{INTERNAL_PREFIXES, annotate_external_links, is_external_href};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, OrgError>;
