//! # 证书签发
//!
//! 以非交互方式调用 easy-rsa 为客户端名签发完整的客户端证书，私钥不设口令。
//! 进程调用经由 `CommandRunner` 完成：参数以独立列表传递，工作目录显式给出。

use crate::error::ProvisionError;
use crate::types::ClientIdentifier;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// 捕获的输出在错误中保留的最大字节数
const MAX_CAPTURED_OUTPUT: usize = 4096;

/// 外部进程执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// 退出码，被信号终止时为 `None`
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// 合并后的输出，截断到固定长度
    pub fn combined_output(&self) -> String {
        let mut combined = String::new();
        for part in [self.stderr.trim(), self.stdout.trim()] {
            if part.is_empty() {
                continue;
            }
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(part);
        }

        if combined.len() > MAX_CAPTURED_OUTPUT {
            let mut end = MAX_CAPTURED_OUTPUT;
            while !combined.is_char_boundary(end) {
                end -= 1;
            }
            combined.truncate(end);
        }
        combined
    }
}

/// 外部进程执行抽象
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 在指定工作目录下执行程序并等待结束
    async fn run(&self, program: &Path, args: &[String], working_dir: &Path) -> std::io::Result<CommandOutput>;
}

/// 基于 `tokio::process` 的进程执行器
///
/// 等待中的 future 被丢弃时不终止子进程，easy-rsa 总能完整执行并释放自己的锁目录。
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &Path, args: &[String], working_dir: &Path) -> std::io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            status: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// 客户端证书签发器
pub struct CredentialIssuer {
    runner: Arc<dyn CommandRunner>,
    working_dir: PathBuf,
    program: PathBuf,
}

impl CredentialIssuer {
    /// 创建签发器
    ///
    /// 相对路径的可执行文件按工作目录解析。
    pub fn new<P: AsRef<Path>>(runner: Arc<dyn CommandRunner>, working_dir: P, program: &str) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let program_path = Path::new(program);
        let program = if program_path.is_absolute() {
            program_path.to_path_buf()
        } else {
            working_dir.join(program_path)
        };

        Self {
            runner,
            working_dir,
            program,
        }
    }

    /// easy-rsa 签发命令参数
    pub fn build_args(identifier: &ClientIdentifier) -> Vec<String> {
        vec![
            "--batch".to_string(),
            "build-client-full".to_string(),
            identifier.as_str().to_string(),
            "nopass".to_string(),
        ]
    }

    /// 为客户端名签发证书
    pub async fn issue(&self, identifier: &ClientIdentifier) -> Result<(), ProvisionError> {
        let args = Self::build_args(identifier);
        debug!("执行 {} {:?} (工作目录 {})", self.program.display(), args, self.working_dir.display());

        let output = self
            .runner
            .run(&self.program, &args, &self.working_dir)
            .await
            .map_err(|e| {
                warn!("无法启动 easy-rsa: {}", e);
                ProvisionError::IssueFailed {
                    identifier: identifier.to_string(),
                    status: None,
                    reason: format!("无法启动颁发机构: {}", e),
                    output: String::new(),
                }
            })?;

        if !output.success {
            let captured = output.combined_output();
            warn!(
                "客户端 {} 签发失败，退出码 {:?}: {}",
                identifier, output.status, captured
            );
            let reason = match output.status {
                Some(code) => format!("颁发机构退出码 {}", code),
                None => "颁发机构被信号终止".to_string(),
            };
            return Err(ProvisionError::IssueFailed {
                identifier: identifier.to_string(),
                status: output.status,
                reason,
                output: captured,
            });
        }

        info!("客户端 {} 证书已签发", identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 记录调用参数并返回预设结果的执行器
    struct RecordingRunner {
        result: CommandOutput,
        calls: Mutex<Vec<(PathBuf, Vec<String>, PathBuf)>>,
    }

    impl RecordingRunner {
        fn new(result: CommandOutput) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, program: &Path, args: &[String], working_dir: &Path) -> std::io::Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec(), working_dir.to_path_buf()));
            Ok(self.result.clone())
        }
    }

    struct SpawnFailure;

    #[async_trait]
    impl CommandRunner for SpawnFailure {
        async fn run(&self, _program: &Path, _args: &[String], _working_dir: &Path) -> std::io::Result<CommandOutput> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "easyrsa"))
        }
    }

    fn output(status: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            status: Some(status),
            success: status == 0,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn id(name: &str) -> ClientIdentifier {
        ClientIdentifier::parse(name).expect("合法客户端名")
    }

    #[tokio::test]
    async fn test_issue_passes_discrete_arguments() {
        let runner = Arc::new(RecordingRunner::new(output(0, "")));
        let issuer = CredentialIssuer::new(runner.clone(), "/etc/openvpn/easy-rsa", "./easyrsa");

        issuer.issue(&id("client-01")).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (program, args, cwd) = &calls[0];
        assert_eq!(program, &PathBuf::from("/etc/openvpn/easy-rsa/./easyrsa"));
        assert_eq!(args, &vec!["--batch", "build-client-full", "client-01", "nopass"]);
        assert_eq!(cwd, &PathBuf::from("/etc/openvpn/easy-rsa"));
    }

    #[tokio::test]
    async fn test_absolute_program_is_kept() {
        let runner = Arc::new(RecordingRunner::new(output(0, "")));
        let issuer = CredentialIssuer::new(runner.clone(), "/srv/pki", "/usr/share/easy-rsa/easyrsa");

        issuer.issue(&id("abc")).await.unwrap();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].0, PathBuf::from("/usr/share/easy-rsa/easyrsa"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_issue_failure() {
        let runner = Arc::new(RecordingRunner::new(output(1, "Easy-RSA error: request exists")));
        let issuer = CredentialIssuer::new(runner, "/etc/openvpn/easy-rsa", "./easyrsa");

        let err = issuer.issue(&id("abc")).await.unwrap_err();
        match err {
            ProvisionError::IssueFailed { status, output, .. } => {
                assert_eq!(status, Some(1));
                assert!(output.contains("request exists"));
            }
            other => panic!("意外的错误: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_issue_failure() {
        let issuer = CredentialIssuer::new(Arc::new(SpawnFailure), "/nonexistent", "./easyrsa");
        let err = issuer.issue(&id("abc")).await.unwrap_err();
        assert!(matches!(err, ProvisionError::IssueFailed { status: None, .. }));
    }

    #[test]
    fn test_combined_output_is_truncated() {
        let out = CommandOutput {
            status: Some(1),
            success: false,
            stdout: "x".repeat(MAX_CAPTURED_OUTPUT * 2),
            stderr: "错误".to_string(),
        };
        let combined = out.combined_output();
        assert!(combined.len() <= MAX_CAPTURED_OUTPUT);
        assert!(combined.starts_with("错误\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TokioCommandRunner;

        let ok = runner
            .run(Path::new("/bin/sh"), &["-c".to_string(), "pwd".to_string()], dir.path())
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.status, Some(0));

        let failed = runner
            .run(Path::new("/bin/sh"), &["-c".to_string(), "echo boom >&2; exit 3".to_string()], dir.path())
            .await
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.status, Some(3));
        assert_eq!(failed.stderr.trim(), "boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_survives_dropped_caller() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let runner = TokioCommandRunner;
        let args = ["-c".to_string(), "sleep 0.3; touch done".to_string()];

        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            runner.run(Path::new("/bin/sh"), &args, dir.path()),
        )
        .await;
        assert!(waited.is_err(), "调用方应在进程结束前放弃等待");

        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(marker.exists(), "子进程应在调用方放弃后继续执行完毕");
    }
}
