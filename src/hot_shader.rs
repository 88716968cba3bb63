use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use crate::gpu::GpuContext;
use crate::shader::ShaderError;
use crate::shader_factory::{DEFAULT_PIXEL_CODE, PixelShader, ShaderFactory, user_line_offset};

/// A shader source file that can be hot-reloaded from disk.
pub struct HotShader {
    path: PathBuf,
    last_modified: SystemTime,
    source: String,
}

impl HotShader {
    /// Load a shader from the given file path.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let source = fs::read_to_string(&path)?;
        let last_modified = fs::metadata(&path)?.modified()?;

        Ok(Self {
            path,
            last_modified,
            source,
        })
    }

    /// Create the file at `path` with `source`.
    pub fn create(path: impl AsRef<Path>, source: &str) -> std::io::Result<Self> {
        fs::write(path.as_ref(), source)?;
        Self::new(path)
    }

    /// Check if the file has been modified and reload if so.
    /// Returns `true` if the source was reloaded.
    pub fn check_reload(&mut self) -> bool {
        let Ok(metadata) = fs::metadata(&self.path) else {
            return false;
        };

        let Ok(modified) = metadata.modified() else {
            return false;
        };

        if modified > self.last_modified {
            if let Ok(source) = fs::read_to_string(&self.path) {
                self.source = source;
                self.last_modified = modified;
                return true;
            }
        }

        false
    }

    /// Write `source` to the file. Our own writes never trigger a reload.
    pub fn write(&mut self, source: &str) -> std::io::Result<()> {
        fs::write(&self.path, source)?;
        self.source = source.to_string();
        self.last_modified = fs::metadata(&self.path)?.modified()?;
        Ok(())
    }

    /// Get the current source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Compile state shown in the status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStatus {
    /// The running program matches the code.
    Compiled,
    /// The last compile succeeded but the code has changed since.
    Edited,
    /// The last compile failed; nothing is drawn.
    Failed,
}

/// Code and bookkeeping of a shader session, independent of the GPU.
#[derive(Clone, Debug)]
pub struct EditState {
    code: String,
    compiled_code: String,
    saved_code: String,
    compiled: bool,
    last_error: Option<String>,
}

impl EditState {
    /// State for code that matches what is on disk and has not been compiled.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            compiled_code: code.clone(),
            saved_code: code.clone(),
            code,
            compiled: false,
            last_error: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    /// Replace the code with freshly loaded file contents.
    pub fn load(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.saved_code = self.code.clone();
    }

    /// Record the outcome of compiling the current code.
    pub fn record_compile(&mut self, result: Result<(), String>) {
        self.compiled_code = self.code.clone();
        match result {
            Ok(()) => {
                self.compiled = true;
                self.last_error = None;
            }
            Err(message) => {
                self.compiled = false;
                self.last_error = Some(message);
            }
        }
    }

    /// Record that the current code was written to disk.
    pub fn mark_saved(&mut self) {
        self.saved_code = self.code.clone();
    }

    pub fn compiled(&self) -> bool {
        self.compiled
    }

    /// Code changed since the last compile.
    pub fn edited(&self) -> bool {
        self.code != self.compiled_code
    }

    /// Code differs from what was last loaded or saved.
    pub fn file_changed(&self) -> bool {
        self.code != self.saved_code
    }

    pub fn status(&self) -> CompileStatus {
        if !self.compiled {
            CompileStatus::Failed
        } else if self.edited() {
            CompileStatus::Edited
        } else {
            CompileStatus::Compiled
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// First non-empty line of the last compile error, for a status line.
    pub fn error_summary(&self) -> Option<&str> {
        self.last_error()?
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

/// The user's pixel shader: code, optional backing file and compiled program.
///
/// The file is watched for changes and recompiled when it is modified on
/// disk. Compiling also writes the code back to the file, if there is one.
/// While the last compile failed no program is exposed, so the compositor
/// skips the user pass entirely.
pub struct ShaderSession {
    state: EditState,
    file: Option<HotShader>,
    program: Option<Rc<PixelShader>>,
}

impl ShaderSession {
    /// A session with the given code and no file.
    pub fn from_code(gpu: &GpuContext, code: &str) -> Self {
        let mut session = Self {
            state: EditState::new(code),
            file: None,
            program: None,
        };
        session.compile_current(gpu);
        session
    }

    /// Open a shader file and compile it.
    pub fn open(gpu: &GpuContext, path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let file = HotShader::new(path)?;
        log::info!("Opened shader {:?}", file.path());
        let mut session = Self {
            state: EditState::new(file.source()),
            file: Some(file),
            program: None,
        };
        session.compile_current(gpu);
        Ok(session)
    }

    /// Compile the current code, then write it to the backing file if there
    /// is one. Returns whether compilation succeeded.
    pub fn compile(&mut self, gpu: &GpuContext) -> bool {
        let ok = self.compile_current(gpu);
        if self.file.is_some() {
            if let Err(e) = self.save() {
                log::warn!("Failed to save shader: {}", e);
            }
        }
        ok
    }

    fn compile_current(&mut self, gpu: &GpuContext) -> bool {
        match ShaderFactory::compile_from_source(gpu, self.state.code()) {
            Ok(program) => {
                self.program = Some(program);
                self.state.record_compile(Ok(()));
                true
            }
            Err(e) => {
                log::warn!(
                    "Failed to compile shader (user code starts at line {}): {}",
                    user_line_offset(),
                    e
                );
                self.program = None;
                self.state.record_compile(Err(e.to_string()));
                false
            }
        }
    }

    /// Reload and recompile if the backing file changed on disk.
    /// Call once per frame. Returns `true` if the file was reloaded.
    pub fn poll_file(&mut self, gpu: &GpuContext) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        if !file.check_reload() {
            return false;
        }

        log::info!("Reloading shader {:?}", file.path());
        self.state.load(file.source());
        self.compile_current(gpu);
        true
    }

    /// Write the current code to the backing file. Returns `false` if the
    /// session has no file.
    pub fn save(&mut self) -> std::io::Result<bool> {
        let Some(file) = self.file.as_mut() else {
            return Ok(false);
        };
        file.write(self.state.code())?;
        self.state.mark_saved();
        log::info!("Saved shader {:?}", file.path());
        Ok(true)
    }

    /// Attach the session to `path` and write the current code there.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = HotShader::create(path, self.state.code())?;
        log::info!("Saved shader as {:?}", file.path());
        self.file = Some(file);
        self.state.mark_saved();
        Ok(())
    }

    /// Detach from any file and start over with the default pixel function.
    pub fn new_file(&mut self, gpu: &GpuContext) {
        if self.state.file_changed() {
            log::warn!("Discarding unsaved changes to {}", self.file_name());
        }
        self.file = None;
        self.state = EditState::new(DEFAULT_PIXEL_CODE);
        self.compile_current(gpu);
    }

    /// The compiled program, if the last compile succeeded.
    pub fn program(&self) -> Option<&Rc<PixelShader>> {
        self.program.as_ref()
    }

    pub fn status(&self) -> CompileStatus {
        self.state.status()
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn code(&self) -> &str {
        self.state.code()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(HotShader::path)
    }

    /// File name for display, `Untitled` without a file.
    pub fn file_name(&self) -> String {
        self.path()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("shadervis-{}-{}.wgsl", std::process::id(), name))
    }

    #[test]
    fn new_state_is_clean_but_not_compiled() {
        let state = EditState::new("a");
        assert!(!state.edited());
        assert!(!state.file_changed());
        assert_eq!(state.status(), CompileStatus::Failed);
    }

    #[test]
    fn status_transitions() {
        let mut state = EditState::new("a");
        state.record_compile(Ok(()));
        assert_eq!(state.status(), CompileStatus::Compiled);

        state.set_code("b");
        assert_eq!(state.status(), CompileStatus::Edited);
        assert!(state.file_changed());

        state.record_compile(Err("bad token".into()));
        assert_eq!(state.status(), CompileStatus::Failed);
        assert!(!state.compiled());
        assert_eq!(state.last_error(), Some("bad token"));
        assert!(!state.edited());

        state.set_code("c");
        state.record_compile(Ok(()));
        assert_eq!(state.status(), CompileStatus::Compiled);
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn error_summary_is_first_line() {
        let mut state = EditState::new("a");
        assert_eq!(state.error_summary(), None);

        state.record_compile(Err("\n  error: expected ';'\n   ┌─ wgsl:12:5\n".into()));
        assert_eq!(state.error_summary(), Some("error: expected ';'"));

        state.record_compile(Err(String::new()));
        assert_eq!(state.error_summary(), None);
    }

    #[test]
    fn reverting_edits_clears_flags() {
        let mut state = EditState::new("a");
        state.record_compile(Ok(()));
        state.set_code("b");
        state.set_code("a");
        assert!(!state.edited());
        assert!(!state.file_changed());
    }

    #[test]
    fn saving_and_loading_track_disk_contents() {
        let mut state = EditState::new("a");
        state.set_code("b");
        state.mark_saved();
        assert!(!state.file_changed());

        state.load("from disk");
        assert_eq!(state.code(), "from disk");
        assert!(!state.file_changed());
        assert!(state.edited());
    }

    #[test]
    fn hot_shader_ignores_own_writes() {
        let path = temp_path("own-writes");
        let mut shader = HotShader::create(&path, "one").unwrap();
        shader.write("two").unwrap();
        assert!(!shader.check_reload());
        assert_eq!(shader.source(), "two");
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn hot_shader_reports_missing_file() {
        assert!(HotShader::new(temp_path("missing")).is_err());
    }
}
