use super::parse::*;
use super::*;

// =============================================================================
// Command-line parsing
// =============================================================================

#[test]
fn test_parse_plain_selection_command() {
    let p = parse_command("|wc -l").unwrap();
    assert_eq!(p.source, Source::Selection);
    assert_eq!(p.sink, Sink::OutputBuffer);
    assert_eq!(p.command, "wc -l");
}

#[test]
fn test_parse_buffer_and_line_prefixes() {
    let p = parse_command("%|sort").unwrap();
    assert_eq!(p.source, Source::Buffer);
    let p = parse_command("% | sort").unwrap();
    assert_eq!(p.source, Source::Buffer);
    assert_eq!(p.command, "sort");
    let p = parse_command(".| tr a-z A-Z").unwrap();
    assert_eq!(p.source, Source::Line);
}

#[test]
fn test_dot_slash_is_not_a_prefix() {
    // `./x` must not read the dot as the current-line prefix
    assert!(parse_command("./x").is_none());
    let p = parse_command("|./x").unwrap();
    assert_eq!(p.source, Source::Selection);
    assert_eq!(p.command, "./x");
}

#[test]
fn test_parse_sinks() {
    assert_eq!(parse_command("%|sort >").unwrap().sink, Sink::Replace);
    assert_eq!(parse_command("|date +>").unwrap().sink, Sink::Insert);
    assert_eq!(parse_command("|ls n>").unwrap().sink, Sink::NewBuffer);
    assert_eq!(parse_command("|ls").unwrap().sink, Sink::OutputBuffer);
}

#[test]
fn test_sink_requires_preceding_whitespace() {
    // Part of the command, not a sink
    let p = parse_command("|echo a>").unwrap();
    assert_eq!(p.sink, Sink::OutputBuffer);
    assert_eq!(p.command, "echo a>");
    let p = parse_command("|grep -c x+>").unwrap();
    assert_eq!(p.sink, Sink::OutputBuffer);
}

#[test]
fn test_sink_inside_quotes_ignored() {
    let p = parse_command("|echo 'a >'").unwrap();
    assert_eq!(p.sink, Sink::OutputBuffer);
    assert_eq!(p.command, "echo 'a >'");
    let p = parse_command("|echo \"x >\"").unwrap();
    assert_eq!(p.sink, Sink::OutputBuffer);
}

#[test]
fn test_sink_after_quoted_arg() {
    let p = parse_command("|grep 'a b' >").unwrap();
    assert_eq!(p.sink, Sink::Replace);
    assert_eq!(p.command, "grep 'a b'");
}

#[test]
fn test_command_trimmed_of_sink() {
    let p = parse_command("%|sort -u n>  ").unwrap();
    assert_eq!(p.sink, Sink::NewBuffer);
    assert_eq!(p.command, "sort -u");
}

#[test]
fn test_missing_pipe_is_rejected() {
    assert!(parse_command("sort").is_none());
    assert!(parse_command("% sort").is_none());
    assert!(parse_command("").is_none());
    assert!(parse_command("|").is_none());
}

// =============================================================================
// Tokenisation and completion helpers
// =============================================================================

#[test]
fn test_tokenize_plain() {
    let (words, last) = tokenize("grep -n foo");
    assert_eq!(words, vec!["grep", "-n", "foo"]);
    assert_eq!(last, 8);
}

#[test]
fn test_tokenize_quotes_and_escapes() {
    let (words, _) = tokenize(r#"echo 'a b' "c \" d" e\ f"#);
    assert_eq!(words, vec!["echo", "a b", "c \" d", "e f"]);
}

#[test]
fn test_tokenize_trailing_space() {
    let (words, last) = tokenize("ls ");
    assert_eq!(words, vec!["ls"]);
    assert_eq!(last, 3);
}

#[test]
fn test_common_prefix_byte_identical() {
    let c = |v: &[&str]| common_prefix(&v.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    assert_eq!(c(&["foobar", "foobaz", "foob"]), "foob");
    assert_eq!(c(&["abc"]), "abc");
    assert_eq!(c(&["Make", "make"]), "");
    assert_eq!(c(&[]), "");
}

// =============================================================================
// Subprocess pump
// =============================================================================

fn run_to_completion(job: &mut ShellJob) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !job.tick() {
        assert!(Instant::now() < deadline, "job did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_sort_roundtrip() {
    let mut job = ShellJob::spawn("sort", b"c\nb\na\n".to_vec()).unwrap();
    run_to_completion(&mut job);
    assert_eq!(job.status, Some(0));
    assert_eq!(job.stdout_data, b"a\nb\nc\n");
    assert!(job.stderr_data.is_empty());
    assert!(!job.stdout_truncated);
}

#[test]
fn test_large_stdin_does_not_deadlock() {
    // Bigger than any pipe buffer in both directions
    let line = "0123456789abcdef\n".repeat(64 * 1024);
    let mut job = ShellJob::spawn("cat", line.clone().into_bytes()).unwrap();
    run_to_completion(&mut job);
    assert_eq!(job.status, Some(0));
    assert_eq!(job.stdout_data.len(), line.len());
}

#[test]
fn test_stderr_collected_separately() {
    let mut job = ShellJob::spawn("echo out; echo err 1>&2", Vec::new()).unwrap();
    run_to_completion(&mut job);
    assert_eq!(job.stdout_data, b"out\n");
    assert_eq!(job.stderr_data, b"err\n");
}

#[test]
fn test_nonzero_exit_status() {
    let mut job = ShellJob::spawn("exit 3", Vec::new()).unwrap();
    run_to_completion(&mut job);
    assert_eq!(job.status, Some(3));
}

#[test]
fn test_signalled_exit_reads_as_128_plus_signo() {
    let mut job = ShellJob::spawn("kill -KILL $$", Vec::new()).unwrap();
    run_to_completion(&mut job);
    assert_eq!(job.status, Some(128 + 9));
}

#[test]
fn test_cancel_kills_quickly() {
    let mut job = ShellJob::spawn("sleep 30", Vec::new()).unwrap();
    job.tick();
    let t0 = Instant::now();
    job.cancel();
    let deadline = Instant::now() + Duration::from_secs(5);
    while job.status.is_none() && Instant::now() < deadline {
        job.tick();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(job.cancelled);
    assert_eq!(job.status, Some(128 + 9));
    assert!(t0.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_completion_lists_commands() {
    if find_bash().is_none() {
        return;
    }
    let names = complete("sh", CompletionKind::Command);
    assert!(names.iter().any(|n| n == "sh"));
}

#[test]
fn test_completion_unknown_token_is_empty() {
    if find_bash().is_none() {
        return;
    }
    let names = complete("zz-no-such-command-zz", CompletionKind::Command);
    assert!(names.is_empty());
}
