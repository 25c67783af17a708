/*!
 * Exec Tests
 * execv argument passing, limits and failure atomicity
 */

use super::common::{kernel, log, Kernel};
use edu_kernel::core::limits::{ARG_COUNT_MAX, ARG_STR_MAX, PATH_MAX};
use edu_kernel::core::KernelError;
use edu_kernel::{UserContext, UserPtr};
use pretty_assertions::assert_eq;

/// Registers `/bin/echoargs`, which logs its pid and arguments
fn echoargs(k: &Kernel) -> super::common::Log<(u32, usize, Vec<String>)> {
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/echoargs", move |ctx: &mut UserContext| {
        out.lock().push((ctx.getpid(), ctx.argc(), ctx.args().unwrap()));
        ctx.argc() as i32
    });
    seen
}

#[test]
fn test_execv_passes_arguments() {
    let k = kernel();
    let seen = echoargs(&k);
    k.registry.register("/bin/launcher", |ctx| {
        let path = ctx.push_str("/bin/echoargs").unwrap();
        let argv = ctx.push_argv(&["a", "bb", "ccc"]).unwrap();
        let err = ctx.execv(path, argv);
        panic!("execv returned {err}");
    });

    let init = k.manager.spawn_program("/bin/launcher", &["launcher"]).unwrap();
    let status = k.manager.join(&init);

    assert_eq!(status.exit_code(), 3);
    let (pid, argc, args) = seen.lock()[0].clone();
    assert_eq!(pid, init.pid());
    assert_eq!(argc, 3);
    assert_eq!(args, vec!["a", "bb", "ccc"]);
    assert_eq!(init.name(), "/bin/echoargs");
}

#[test]
fn test_spawn_program_passes_arguments() {
    let k = kernel();
    let seen = echoargs(&k);

    let init = k
        .manager
        .spawn_program("/bin/echoargs", &["echoargs", "-v", ""])
        .unwrap();
    assert_eq!(k.manager.join(&init).exit_code(), 3);
    assert_eq!(seen.lock()[0].2, vec!["echoargs", "-v", ""]);
}

#[test]
fn test_execv_replaces_address_space() {
    let k = kernel();
    let manager = k.manager.clone();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/report", move |_| {
        out.lock().push(manager.vm().pages_in_use());
        0
    });
    let spawn_pages = log();
    let spawn_out = spawn_pages.clone();
    let manager = k.manager.clone();
    k.registry.register("/bin/start", move |ctx| {
        spawn_out.lock().push(manager.vm().pages_in_use());
        let path = ctx.push_str("/bin/report").unwrap();
        let argv = ctx.push_argv(&["report"]).unwrap();
        ctx.execv(path, argv);
        1
    });

    let init = k.manager.spawn_program("/bin/start", &["start"]).unwrap();
    assert_eq!(k.manager.join(&init).exit_code(), 0);
    // Only one image is alive after the switch
    assert_eq!(seen.lock()[0], spawn_pages.lock()[0]);
    assert_eq!(k.manager.vm().pages_in_use(), 0);
}

/// Run `attempt` inside a program and return the error execv gave it
///
/// The program also checks that its heap survived the failed call.
fn failed_exec(k: &Kernel, attempt: fn(&mut UserContext) -> KernelError) -> KernelError {
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/attempt", move |ctx| {
        let marker = ctx.push_str("still here").unwrap();
        let err = attempt(ctx);
        let intact = ctx.read_str(marker, 32).map(|s| s == "still here").unwrap_or(false);
        out.lock().push((err, intact));
        0
    });

    let init = k.manager.spawn_program("/bin/attempt", &["attempt"]).unwrap();
    assert_eq!(k.manager.join(&init).exit_code(), 0);
    assert_eq!(init.name(), "/bin/attempt");

    let (err, intact) = seen.lock()[0].clone();
    assert!(intact, "caller image damaged by failed execv");
    err
}

#[test]
fn test_execv_too_many_arguments() {
    let k = kernel();
    echoargs(&k);
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("/bin/echoargs").unwrap();
        let args: Vec<String> = (0..ARG_COUNT_MAX + 1).map(|i| i.to_string()).collect();
        let argv = ctx.push_argv(&args).unwrap();
        ctx.execv(path, argv)
    });
    assert_eq!(err, KernelError::TooManyArguments { limit: ARG_COUNT_MAX });
    assert_eq!(err.errno().code(), 14);
}

#[test]
fn test_execv_accepts_argument_limits() {
    let k = kernel();
    let seen = echoargs(&k);
    let full: Vec<String> = (0..ARG_COUNT_MAX)
        .map(|i| format!("{i:04}").repeat(ARG_STR_MAX / 4))
        .collect();
    let args = full.clone();
    k.registry.register("/bin/biglaunch", move |ctx| {
        let path = ctx.push_str("/bin/echoargs").unwrap();
        let argv = ctx.push_argv(&args).unwrap();
        ctx.execv(path, argv);
        -1
    });

    let init = k.manager.spawn_program("/bin/biglaunch", &["biglaunch"]).unwrap();
    assert_eq!(k.manager.join(&init).exit_code(), ARG_COUNT_MAX as i32);

    let (_, argc, args) = seen.lock()[0].clone();
    assert_eq!(argc, ARG_COUNT_MAX);
    assert!(args.iter().all(|a| a.len() == ARG_STR_MAX));
    assert_eq!(args, full);
}

#[test]
fn test_execv_argument_too_long() {
    let k = kernel();
    echoargs(&k);
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("/bin/echoargs").unwrap();
        let long = "z".repeat(ARG_STR_MAX + 1);
        let argv = ctx.push_argv(&["ok", long.as_str()]).unwrap();
        ctx.execv(path, argv)
    });
    assert_eq!(
        err,
        KernelError::ArgumentTooLong {
            index: 1,
            limit: ARG_STR_MAX
        }
    );
}

#[test]
fn test_execv_missing_program() {
    let k = kernel();
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("/bin/nothing").unwrap();
        let argv = ctx.push_argv(&["nothing"]).unwrap();
        ctx.execv(path, argv)
    });
    assert!(matches!(err, KernelError::NotFound(_)));
    assert_eq!(err.errno().code(), 19);
}

#[test]
fn test_execv_not_executable() {
    let k = kernel();
    k.registry.register_file("/etc/motd", b"welcome");
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("/etc/motd").unwrap();
        let argv = ctx.push_argv(&["motd"]).unwrap();
        ctx.execv(path, argv)
    });
    assert!(matches!(err, KernelError::InvalidExecutable(_)));
}

#[test]
fn test_execv_bad_pointers() {
    let k = kernel();
    let err = failed_exec(&k, |ctx| {
        let argv = ctx.push_argv(&["x"]).unwrap();
        ctx.execv(UserPtr::NULL, argv)
    });
    assert!(matches!(err, KernelError::InvalidArgument(_)));

    let k = kernel();
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("/bin/echoargs").unwrap();
        ctx.execv(path, UserPtr::NULL)
    });
    assert!(matches!(err, KernelError::InvalidArgument(_)));

    let k = kernel();
    echoargs(&k);
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("/bin/echoargs").unwrap();
        ctx.execv(path, UserPtr(0x7))
    });
    assert!(matches!(err, KernelError::BadAddress(_)));
}

#[test]
fn test_execv_path_limits() {
    let k = kernel();
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str(&"p".repeat(PATH_MAX + 1)).unwrap();
        let argv = ctx.push_argv(&["p"]).unwrap();
        ctx.execv(path, argv)
    });
    assert_eq!(err, KernelError::NameTooLong { limit: PATH_MAX });

    let k = kernel();
    let err = failed_exec(&k, |ctx| {
        let path = ctx.push_str("").unwrap();
        let argv = ctx.push_argv(&["p"]).unwrap();
        ctx.execv(path, argv)
    });
    assert!(matches!(err, KernelError::InvalidArgument(_)));
}

#[test]
fn test_forked_child_execs() {
    let k = kernel();
    let seen = echoargs(&k);
    k.registry.register("/bin/shell", |ctx| {
        let child = ctx
            .fork(|ctx| {
                let path = ctx.push_str("/bin/echoargs").unwrap();
                let argv = ctx.push_argv(&["echoargs", "from", "child"]).unwrap();
                ctx.execv(path, argv);
                100
            })
            .unwrap();
        let status = ctx.alloc(4).unwrap();
        ctx.waitpid(child, status, 0).unwrap();
        ctx.read_i32(status).unwrap() >> 2
    });

    let init = k.manager.spawn_program("/bin/shell", &["shell"]).unwrap();
    assert_eq!(k.manager.join(&init).exit_code(), 3);
    assert_eq!(seen.lock()[0].2, vec!["echoargs", "from", "child"]);
    assert_eq!(k.manager.process_count(), 0);
}
