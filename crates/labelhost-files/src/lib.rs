//! Local file serving for storage connections.
//!
//! [`LocalFileGate`] decides whether an authenticated user may read a file
//! under the configured document root, and streams it with range support when
//! they may. Requested paths go through [`DocumentRoot::resolve`] first, which
//! refuses anything that would escape the root.
//!
//! | Outcome | Status |
//! |---------|--------|
//! | serving disabled | 403 with explanation |
//! | no path, anonymous user | 403 |
//! | no readable storage, missing file, traversal | 404 |
//! | readable file | 200 / 206 |

mod gate;
pub mod path;

pub use gate::{AuthorizedFile, GateError, LocalFileGate, DISABLED_MESSAGE};
pub use path::{DocumentRoot, PathError, ResolvedPath};
