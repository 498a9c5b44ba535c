//! Metadata entities and the registry that owns them
//!
//! Every upsert is idempotent and partial: fields present in the incoming
//! record overwrite, absent fields keep whatever an earlier record set.
//! Referencing an id that was never announced creates a placeholder, so a
//! lookup by id never fails once any event has mentioned it.

use rtprof_common::{
    ClassRecord, FunctionRecord, ModuleRecord, SourceFileRecord, SourceLineRecord,
    ThreadAssignment,
};
use serde::Serialize;

use super::Arena;
use crate::domain::{ClassId, FunctionId, ModuleId, SourceFileId, SourceLineId, ThreadId, Timestamp};

/// Display name for entities whose name never arrived
pub const UNKNOWN_NAME: &str = "<unknown>";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    pub name: Option<String>,
    pub module: Option<ModuleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: Option<String>,
    pub signature: Option<String>,
    pub token: Option<u32>,
    pub class: Option<ClassId>,
    pub module: Option<ModuleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceFileInfo {
    /// Path as recorded in the trace
    pub path: Option<String>,
    /// Path set by a consumer after the file was moved
    pub relocated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLineInfo {
    pub file: Option<SourceFileId>,
    pub function: Option<FunctionId>,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    pub os_thread_id: Option<u64>,
    pub name: Option<String>,
    pub created_at: Option<Timestamp>,
    pub destroyed_at: Option<Timestamp>,
}

/// Append-only id → descriptor tables for one session
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    modules: Arena<ModuleInfo>,
    classes: Arena<ClassInfo>,
    functions: Arena<FunctionInfo>,
    source_files: Arena<SourceFileInfo>,
    source_lines: Arena<SourceLineInfo>,
    threads: Arena<ThreadInfo>,
}

impl MetadataRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Upserts
    // ---------------------------------------------------------------------

    pub fn upsert_module(&mut self, record: &ModuleRecord) {
        let module = self.modules.get_or_default(record.id as usize);
        module.path = Some(record.path.clone());
    }

    pub fn upsert_class(&mut self, record: &ClassRecord) {
        if let Some(module) = record.module {
            self.ensure_module(ModuleId(module));
        }
        let class = self.classes.get_or_default(record.id as usize);
        class.name = Some(record.name.clone());
        if let Some(module) = record.module {
            class.module = Some(ModuleId(module));
        }
    }

    pub fn upsert_function(&mut self, record: &FunctionRecord) {
        if let Some(class) = record.class {
            self.ensure_class(ClassId(class));
        }
        if let Some(module) = record.module {
            self.ensure_module(ModuleId(module));
        }
        let function = self.functions.get_or_default(record.id as usize);
        function.name = Some(record.name.clone());
        if record.signature.is_some() {
            function.signature.clone_from(&record.signature);
        }
        if record.token.is_some() {
            function.token = record.token;
        }
        if let Some(class) = record.class {
            function.class = Some(ClassId(class));
        }
        if let Some(module) = record.module {
            function.module = Some(ModuleId(module));
        }
    }

    pub fn upsert_source_file(&mut self, record: &SourceFileRecord) {
        let file = self.source_files.get_or_default(record.id as usize);
        file.path = Some(record.path.clone());
    }

    pub fn upsert_source_line(&mut self, record: &SourceLineRecord) {
        self.ensure_source_file(SourceFileId(record.file));
        self.ensure_function(FunctionId(record.function));
        let line = self.source_lines.get_or_default(record.id as usize);
        line.file = Some(SourceFileId(record.file));
        line.function = Some(FunctionId(record.function));
        line.start_line = record.start_line;
        line.end_line = record.end_line;
        line.start_column = record.start_column;
        line.end_column = record.end_column;
    }

    pub fn assign_thread(&mut self, record: &ThreadAssignment) {
        let thread = self.threads.get_or_default(record.thread as usize);
        thread.os_thread_id = Some(record.os_thread_id);
        if record.name.is_some() {
            thread.name.clone_from(&record.name);
        }
    }

    pub fn thread_created(&mut self, id: ThreadId, at: Timestamp) {
        self.ensure_thread(id).created_at = Some(at);
    }

    pub fn thread_destroyed(&mut self, id: ThreadId, at: Timestamp) {
        self.ensure_thread(id).destroyed_at = Some(at);
    }

    // ---------------------------------------------------------------------
    // Placeholders
    // ---------------------------------------------------------------------

    pub fn ensure_module(&mut self, id: ModuleId) -> &mut ModuleInfo {
        self.modules.get_or_default(id.index())
    }

    pub fn ensure_class(&mut self, id: ClassId) -> &mut ClassInfo {
        self.classes.get_or_default(id.index())
    }

    pub fn ensure_function(&mut self, id: FunctionId) -> &mut FunctionInfo {
        self.functions.get_or_default(id.index())
    }

    pub fn ensure_source_file(&mut self, id: SourceFileId) -> &mut SourceFileInfo {
        self.source_files.get_or_default(id.index())
    }

    pub fn ensure_source_line(&mut self, id: SourceLineId) -> &mut SourceLineInfo {
        self.source_lines.get_or_default(id.index())
    }

    pub fn ensure_thread(&mut self, id: ThreadId) -> &mut ThreadInfo {
        self.threads.get_or_default(id.index())
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&ModuleInfo> {
        self.modules.get(id.index())
    }

    #[must_use]
    pub fn class(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes.get(id.index())
    }

    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&FunctionInfo> {
        self.functions.get(id.index())
    }

    #[must_use]
    pub fn source_file(&self, id: SourceFileId) -> Option<&SourceFileInfo> {
        self.source_files.get(id.index())
    }

    #[must_use]
    pub fn source_line(&self, id: SourceLineId) -> Option<&SourceLineInfo> {
        self.source_lines.get(id.index())
    }

    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<&ThreadInfo> {
        self.threads.get(id.index())
    }

    /// All known real threads in id order (the fake thread is skipped)
    pub fn threads(&self) -> impl Iterator<Item = (ThreadId, &ThreadInfo)> {
        self.threads
            .iter()
            .filter_map(|(i, info)| u32::try_from(i).ok().map(|id| (ThreadId(id), info)))
            .filter(|(id, _)| !id.is_fake())
    }

    // ---------------------------------------------------------------------
    // Display helpers
    // ---------------------------------------------------------------------

    /// `Class.method` when both are known, the bare method name otherwise
    #[must_use]
    pub fn function_name(&self, id: FunctionId) -> String {
        let Some(function) = self.function(id) else {
            return UNKNOWN_NAME.to_string();
        };
        let name = function.name.as_deref().unwrap_or(UNKNOWN_NAME);
        match function.class.and_then(|c| self.class(c)).and_then(|c| c.name.as_deref()) {
            Some(class) => format!("{class}.{name}"),
            None => name.to_string(),
        }
    }

    #[must_use]
    pub fn class_name(&self, id: ClassId) -> String {
        self.class(id)
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }

    /// `path:line` for a source line, preferring a relocated file path
    #[must_use]
    pub fn line_location(&self, id: SourceLineId) -> String {
        let Some(line) = self.source_line(id) else {
            return UNKNOWN_NAME.to_string();
        };
        let path = line.file.and_then(|f| self.source_file_path(f));
        match path {
            Some(path) => format!("{path}:{}", line.start_line),
            None => format!("{UNKNOWN_NAME}:{}", line.start_line),
        }
    }

    // ---------------------------------------------------------------------
    // Source file relocation passthrough
    // ---------------------------------------------------------------------

    /// Point a source file at a new location without re-ingesting
    pub fn set_source_file_path(&mut self, id: SourceFileId, path: impl Into<String>) {
        self.ensure_source_file(id).relocated = Some(path.into());
    }

    /// Effective path of a source file (relocated path wins)
    #[must_use]
    pub fn source_file_path(&self, id: SourceFileId) -> Option<&str> {
        let file = self.source_file(id)?;
        file.relocated.as_deref().or(file.path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_record(id: u32, name: &str) -> FunctionRecord {
        FunctionRecord {
            id,
            name: name.to_string(),
            signature: None,
            token: None,
            class: None,
            module: None,
        }
    }

    #[test]
    fn test_placeholder_then_fill() {
        let mut registry = MetadataRegistry::new();
        registry.ensure_function(FunctionId(4));
        assert_eq!(registry.function(FunctionId(4)).and_then(|f| f.name.clone()), None);
        assert_eq!(registry.function_name(FunctionId(4)), UNKNOWN_NAME);

        registry.upsert_function(&function_record(4, "Run"));
        assert_eq!(registry.function_name(FunctionId(4)), "Run");
    }

    #[test]
    fn test_partial_upsert_preserves_fields() {
        let mut registry = MetadataRegistry::new();
        let mut first = function_record(1, "Main");
        first.signature = Some("void ()".to_string());
        first.class = Some(2);
        registry.upsert_function(&first);

        registry.upsert_function(&function_record(1, "Main2"));

        let f = registry.function(FunctionId(1)).unwrap();
        assert_eq!(f.name.as_deref(), Some("Main2"));
        assert_eq!(f.signature.as_deref(), Some("void ()"));
        assert_eq!(f.class, Some(ClassId(2)));
        // Class placeholder was created on first reference
        assert!(registry.class(ClassId(2)).is_some());
    }

    #[test]
    fn test_function_name_includes_class() {
        let mut registry = MetadataRegistry::new();
        registry.upsert_class(&ClassRecord { id: 3, module: None, name: "App.Program".to_string() });
        let mut record = function_record(9, "Main");
        record.class = Some(3);
        registry.upsert_function(&record);

        assert_eq!(registry.function_name(FunctionId(9)), "App.Program.Main");
    }

    #[test]
    fn test_source_file_relocation() {
        let mut registry = MetadataRegistry::new();
        registry.upsert_source_file(&SourceFileRecord { id: 1, path: "/build/a.cs".to_string() });
        registry.upsert_source_line(&SourceLineRecord {
            id: 5,
            file: 1,
            function: 2,
            start_line: 40,
            end_line: 41,
            start_column: 0,
            end_column: 0,
        });
        assert_eq!(registry.line_location(SourceLineId(5)), "/build/a.cs:40");

        registry.set_source_file_path(SourceFileId(1), "/home/me/a.cs");
        assert_eq!(registry.source_file_path(SourceFileId(1)), Some("/home/me/a.cs"));
        assert_eq!(registry.line_location(SourceLineId(5)), "/home/me/a.cs:40");
    }

    #[test]
    fn test_threads_skip_fake() {
        let mut registry = MetadataRegistry::new();
        registry.ensure_thread(ThreadId::FAKE);
        registry.thread_created(ThreadId(2), Timestamp(10));

        let ids: Vec<_> = registry.threads().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![ThreadId(2)]);
    }

    #[test]
    fn test_out_of_range_ids_get_placeholders() {
        let mut registry = MetadataRegistry::new();
        registry.ensure_class(ClassId(u32::MAX));
        registry.ensure_thread(ThreadId(u32::MAX));

        assert_eq!(registry.class_name(ClassId(u32::MAX)), UNKNOWN_NAME);
        let ids: Vec<_> = registry.threads().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![ThreadId(u32::MAX)]);
    }
}
