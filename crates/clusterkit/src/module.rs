//! Hadoop source checkouts: changed modules, their built jars and the project version.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use runkit::Command;

const CHANGED_MODULES_CMD: &str =
    r#"git status --porcelain | grep ".*hadoop.*" | sed -E "s/.*\/(.*)\/src.*/\1/g""#;

/// Distribution subdirectory (under `share/hadoop`) holding the jar of `module`.
pub fn jar_subdir(module: &str) -> &'static str {
    if module.contains("mapreduce") {
        "mapreduce"
    } else if module.contains("hdfs") {
        "hdfs"
    } else {
        "yarn"
    }
}

/// A Hadoop source checkout and the modules picked from it.
#[derive(Debug, Clone)]
pub struct HadoopDir {
    root: PathBuf,
    modules: BTreeMap<String, Option<PathBuf>>,
    changed: BTreeSet<String>,
}

impl HadoopDir {
    /// A checkout rooted at `root`, with no modules picked yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            modules: BTreeMap::new(),
            changed: BTreeSet::new(),
        }
    }

    /// Root of the checkout.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pick every module with uncommitted changes, according to `git status`.
    pub fn extract_changed_modules(&mut self) -> Result<()> {
        log::info!("Searching changed modules in {}", self.root.display());
        let output = Command::new(CHANGED_MODULES_CMD)
            .with_work_dir(&self.root)
            .run()?;
        let modules: BTreeSet<String> = output
            .stdout
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if modules.is_empty() {
            return Err(Error::Other(format!(
                "no changed modules found in {}",
                self.root.display()
            )));
        }

        for module in modules {
            let jar = self.find_jar(&module);
            self.modules.insert(module.clone(), jar);
            self.changed.insert(module);
        }
        Ok(())
    }

    /// Pick modules by name, optionally looking up their built jars.
    pub fn add_modules<S: AsRef<str>>(&mut self, modules: &[S], with_jar: bool) {
        for module in modules {
            let module = module.as_ref();
            let jar = if with_jar { self.find_jar(module) } else { None };
            self.modules.insert(module.to_string(), jar);
        }
    }

    /// Names of the picked modules.
    pub fn modules(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Modules picked because they have uncommitted changes.
    pub fn changed_modules(&self) -> Vec<&str> {
        self.changed.iter().map(String::as_str).collect()
    }

    /// Built jar of every picked module that has one.
    pub fn jar_paths(&self) -> BTreeMap<&str, &Path> {
        self.modules
            .iter()
            .filter_map(|(module, jar)| jar.as_deref().map(|jar| (module.as_str(), jar)))
            .collect()
    }

    /// Version declared by the root `pom.xml`, e.g. `3.4.0-SNAPSHOT`.
    pub fn project_version(&self) -> Result<String> {
        let pom = self.root.join("pom.xml");
        let text = fs::read_to_string(&pom).map_err(|e| Error::io(&pom, e))?;
        parse_project_version(&text)
            .ok_or_else(|| Error::Other(format!("no project version in {}", pom.display())))
    }

    /// Copy the jars of `modules` (every picked module when empty) into the
    /// `share/hadoop` layout of a distribution at `dest`.
    pub fn copy_modules_to_dist<S: AsRef<str>>(&self, dest: &Path, modules: &[S]) -> Result<Vec<PathBuf>> {
        let selected: Vec<&str> = if modules.is_empty() {
            self.modules()
        } else {
            modules.iter().map(AsRef::as_ref).collect()
        };

        let mut copied = Vec::new();
        for module in selected {
            let Some(Some(jar)) = self.modules.get(module) else {
                log::warn!("No jar found for module {module}, skipping");
                continue;
            };
            let Some(name) = jar.file_name() else { continue };
            let target = dest.join("hadoop").join(jar_subdir(module)).join(name);
            log::info!("Copying {} to {}", jar.display(), target.display());
            fs::copy(jar, &target).map_err(|e| Error::io(&target, e))?;
            copied.push(target);
        }
        Ok(copied)
    }

    fn find_jar(&self, module: &str) -> Option<PathBuf> {
        let marker = format!("{module}/target/");
        let mut candidates: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git" && entry.file_name() != "node_modules")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                name.contains(module)
                    && name.ends_with("-SNAPSHOT.jar")
                    && path.to_string_lossy().contains(&marker)
            })
            .collect();
        candidates.sort();

        let jar = candidates.into_iter().next();
        match &jar {
            Some(path) => log::debug!("Found jar {} for module {module}", path.display()),
            None => log::warn!("No jar found for module {module}"),
        }
        jar
    }
}

fn parse_project_version(pom: &str) -> Option<String> {
    let parent = Regex::new(r"(?s)<parent>.*?</parent>").ok()?;
    let version = Regex::new(r"<version>\s*([^<\s]+)\s*</version>").ok()?;
    let without_parent = parent.replace(pom, "");
    version
        .captures(&without_parent)
        .map(|caps| caps[1].to_string())
}
