use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

fn spawn_shell(dir: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_smallsh"))
        .current_dir(dir)
        .env_remove("SMALLSH_LOG")
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start smallsh")
}

fn run_script(dir: &Path, script: &str) -> Output {
    let mut child = spawn_shell(dir);
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Read from the shell's stdout until the next ": " prompt.
fn read_prompt(child: &mut Child) -> String {
    let stdout = child.stdout.as_mut().unwrap();
    let mut seen = Vec::new();
    let mut byte = [0u8; 1];
    while !seen.ends_with(b": ") {
        let n = stdout.read(&mut byte).unwrap();
        assert!(n > 0, "shell closed stdout before prompting");
        seen.push(byte[0]);
    }
    String::from_utf8_lossy(&seen).into_owned()
}

#[test]
fn redirect_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(
        dir.path(),
        "echo hello > out.txt\nstatus\ncat < out.txt\nexit\n",
    );

    assert!(output.status.success());
    assert_eq!(stdout_of(&output), ": : exit value 0 \n: hello\n: ");
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello\n");
}

#[test]
fn output_redirect_truncates() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("out.txt"), "this line is much longer than the next\n").unwrap();

    let output = run_script(dir.path(), "echo short > out.txt\nexit\n");

    assert!(output.status.success());
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "short\n");
}

#[test]
fn status_before_any_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "status\nexit\n");

    assert_eq!(stdout_of(&output), ": exit value 0 \n: ");
}

#[test]
fn status_tracks_the_latest_foreground_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "false\nstatus\ntrue\nstatus\nexit\n");

    assert_eq!(
        stdout_of(&output),
        ": : exit value 1 \n: : exit value 0 \n: "
    );
}

#[test]
fn missing_input_file_fails_only_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "cat < nope.txt\nstatus\nexit\n");

    assert!(output.status.success());
    assert!(stderr_of(&output).contains("cannot open file nope.txt for input"));
    assert!(stdout_of(&output).contains("exit value 1 \n"));
}

#[test]
fn unwritable_output_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "echo hi > missing-dir/out.txt\nstatus\nexit\n");

    assert!(stderr_of(&output).contains("cannot open missing-dir/out.txt for output"));
    assert!(stdout_of(&output).contains("exit value 1 \n"));
}

#[test]
fn unknown_program() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "no-such-program-anywhere arg\nstatus\nexit\n");

    assert!(output.status.success());
    assert!(stderr_of(&output).contains("no-such-program-anywhere: no such file or directory"));
    assert!(stdout_of(&output).contains("exit value 1 \n"));
}

#[test]
fn foreground_signal_death_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("selfkill.sh"), "kill -TERM $$\n").unwrap();

    let output = run_script(dir.path(), "sh selfkill.sh\nstatus\nexit\n");

    assert_eq!(
        stdout_of(&output),
        ": terminated by signal 15\n: terminated by signal 15\n: "
    );
}

#[test]
fn background_job_does_not_block_and_exit_kills_it() {
    let dir = tempfile::tempdir().unwrap();
    let start = Instant::now();
    let output = run_script(dir.path(), "sleep 30 &\nstatus\nexit\n");

    assert!(output.status.success());
    assert!(start.elapsed() < Duration::from_secs(10));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("background pid is "));
    assert!(stdout.contains("exit value 0 \n"));
}

#[test]
fn finished_background_job_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "true &\nsleep 1\nsleep 1\nexit\n");
    let stdout = stdout_of(&output);

    let pid = stdout
        .split("background pid is ")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .expect("no background pid line")
        .to_string();
    let done = format!("background pid {} is done: exit value 0\n", pid);
    assert_eq!(stdout.matches(&done).count(), 1, "stdout was {:?}", stdout);
}

#[test]
fn background_output_goes_to_null_device() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "echo hidden &\nsleep 1\nexit\n");

    assert!(!stdout_of(&output).contains("hidden"));
}

#[test]
fn background_with_redirect_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "echo bg > bg.txt &\nsleep 1\nexit\n");

    assert!(output.status.success());
    assert_eq!(fs::read_to_string(dir.path().join("bg.txt")).unwrap(), "bg\n");
}

#[test]
fn background_input_redirect_keeps_stdout() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.txt"), "visible\n").unwrap();

    let output = run_script(dir.path(), "cat < in.txt &\nsleep 1\nexit\n");

    assert!(output.status.success());
    assert!(stdout_of(&output).contains("visible\n"));
}

#[test]
fn background_output_redirect_keeps_stdin() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("peek.sh"), "test -p /dev/stdin && echo pipe\n").unwrap();

    let output = run_script(dir.path(), "sh peek.sh > seen.txt &\nsleep 1\nexit\n");

    assert!(output.status.success());
    assert_eq!(fs::read_to_string(dir.path().join("seen.txt")).unwrap(), "pipe\n");
}

#[test]
fn foreground_child_dies_from_sigint() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("interrupt.sh"), "kill -INT $$\necho survived\n").unwrap();

    let output = run_script(dir.path(), "sh interrupt.sh\nstatus\nexit\n");

    assert_eq!(
        stdout_of(&output),
        ": terminated by signal 2\n: terminated by signal 2\n: "
    );
}

#[test]
fn background_child_ignores_sigint() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("interrupt.sh"), "kill -INT $$\necho survived\n").unwrap();

    let output = run_script(dir.path(), "sh interrupt.sh > bg.txt &\nsleep 1\nexit\n");

    assert!(output.status.success());
    assert_eq!(fs::read_to_string(dir.path().join("bg.txt")).unwrap(), "survived\n");
}

#[test]
fn children_ignore_sigtstp() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stop.sh"), "kill -TSTP $$\necho survived\n").unwrap();

    let start = Instant::now();
    let output = run_script(
        dir.path(),
        "sh stop.sh\nstatus\nsh stop.sh > bg.txt &\nsleep 1\nexit\n",
    );

    assert!(output.status.success());
    assert!(start.elapsed() < Duration::from_secs(10));
    let stdout = stdout_of(&output);
    assert!(stdout.starts_with(": survived\n: exit value 0 \n"), "stdout was {:?}", stdout);
    assert_eq!(fs::read_to_string(dir.path().join("bg.txt")).unwrap(), "survived\n");
}

#[test]
fn pid_expansion() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = spawn_shell(dir.path());
    let pid = child.id();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"echo $$\nexit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(stdout_of(&output).contains(&format!("{}\n", pid)));
}

#[test]
fn comments_and_blank_lines_do_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "# echo nope\n\nexit\n");

    assert_eq!(stdout_of(&output), ": : : ");
}

#[test]
fn cd_prints_the_new_directory() {
    let dir = tempfile::tempdir().unwrap();
    let base = fs::canonicalize(dir.path()).unwrap();
    fs::create_dir(base.join("sub")).unwrap();

    let output = run_script(&base, "cd sub\nexit\n");

    assert!(stdout_of(&output).contains(&format!("{}\n", base.join("sub").display())));
}

#[test]
fn end_of_input_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "status\n");

    assert!(output.status.success());
}

#[test]
fn parse_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "cat >\nstatus\nexit\n");

    assert!(stderr_of(&output).contains("expected filename after '>'"));
    assert!(stdout_of(&output).contains("exit value 0 \n"));
}

#[test]
fn too_many_background_jobs_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_smallsh"))
        .arg("--max-jobs")
        .arg("1")
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"sleep 30 &\nsleep 30 &\nexit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(stdout_of(&output).matches("background pid is ").count(), 1);
    assert!(stderr_of(&output).contains("too many background jobs"));
}

#[test]
fn sigtstp_toggles_foreground_only_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = spawn_shell(dir.path());
    let shell = Pid::from_raw(child.id() as i32);

    read_prompt(&mut child);
    kill(shell, Signal::SIGTSTP).unwrap();

    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"echo fg &\n").unwrap();
    read_prompt(&mut child);

    kill(shell, Signal::SIGTSTP).unwrap();
    stdin.write_all(b"exit\n").unwrap();
    drop(stdin);

    let mut rest = String::new();
    child.stdout.take().unwrap().read_to_string(&mut rest).unwrap();
    assert!(child.wait().unwrap().success());

    assert!(!rest.contains("background pid is"));
    assert!(rest.contains("Exiting foreground-only mode"));
}

#[test]
fn sigtstp_notice_and_foreground_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = spawn_shell(dir.path());
    let shell = Pid::from_raw(child.id() as i32);

    read_prompt(&mut child);
    kill(shell, Signal::SIGTSTP).unwrap();

    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"echo fg &\nexit\n").unwrap();
    drop(stdin);

    let mut rest = String::new();
    child.stdout.take().unwrap().read_to_string(&mut rest).unwrap();
    assert!(child.wait().unwrap().success());

    assert!(rest.contains("Entering foreground-only mode (& is now ignored)\n"));
    assert!(rest.contains("fg\n"));
    assert!(!rest.contains("background pid is"));
}

#[test]
fn sigint_does_not_kill_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = spawn_shell(dir.path());

    read_prompt(&mut child);
    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    child.stdin.take().unwrap().write_all(b"status\nexit\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert!(stdout_of(&output).contains("exit value 0 \n"));
}
