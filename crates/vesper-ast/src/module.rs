//! Files and modules.

use crate::decl::Decl;

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    /// Path relative to the project root; used in diagnostics.
    pub path: String,
    pub decls: Vec<Decl>,
    /// An explicit export list. `None` exports every top-level declaration.
    pub exports: Option<Vec<String>>,
}

/// A module: a named group of files sharing one namespace.
#[derive(Debug, Clone)]
pub struct Module {
    /// The declared package name, e.g. `"Geometry"`.
    pub name: String,
    /// Path of the module's root, used by the loader.
    pub path: String,
    pub files: Vec<File>,
}
