pub mod doctor;
pub mod migrate;

/// What a command prints and the process exit code it maps to.
#[derive(Debug)]
pub struct CommandOutput {
    pub exit_code: u8,
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn ok(lines: Vec<String>) -> Self {
        Self { exit_code: 0, lines }
    }

    pub fn failed(exit_code: u8, message: impl Into<String>) -> Self {
        Self { exit_code, lines: vec![message.into()] }
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Commands are synchronous entry points; database work runs on a throwaway
/// current-thread runtime.
pub(crate) fn block_on<T>(future: impl std::future::Future<Output = T>) -> Result<T, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("failed to initialize async runtime: {error}"))?;
    Ok(runtime.block_on(future))
}
