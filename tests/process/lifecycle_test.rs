/*!
 * Process Lifecycle Tests
 * fork, _exit, waitpid and getpid as seen by running programs
 */

use super::common::{kernel, kernel_with, log, wait_until};
use edu_kernel::core::limits::{FAULT_SIGNAL, HEAP_PAGES, USER_STACK_PAGES};
use edu_kernel::core::{KernelError, Resource};
use edu_kernel::process::{ProcessState, WaitStatus};
use edu_kernel::{KernelConfig, ProcessManager, ProgramRegistry, SimVm, ThreadSpawner, UserPtr};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn test_exit_status_reaches_parent() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/parent", move |ctx| {
        let status = ctx.alloc(4).unwrap();
        let child = ctx.fork(|_| 7).unwrap();
        let reaped = ctx.waitpid(child, status, 0).unwrap();
        out.lock().push((child, reaped, ctx.read_i32(status).unwrap()));
        0
    });

    let init = k.manager.spawn_program("/bin/parent", &["parent"]).unwrap();
    assert_eq!(k.manager.join(&init), WaitStatus::exited(0));

    let (child, reaped, raw) = seen.lock()[0];
    assert_eq!(child, reaped);
    assert_eq!(raw, 7 << 2);
    assert_eq!(WaitStatus::from_raw(raw).exit_code(), 7);
    assert_eq!(k.manager.process_count(), 0);
    assert_eq!(k.manager.vm().pages_in_use(), 0);
}

#[test]
fn test_getpid_matches_fork_result() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/pids", move |ctx| {
        let parent = ctx.getpid();
        let child_log = out.clone();
        let child = ctx
            .fork(move |ctx| {
                child_log.lock().push(("child", ctx.getpid()));
                0
            })
            .unwrap();
        ctx.waitpid(child, UserPtr::NULL, 0).unwrap();
        out.lock().push(("parent", parent));
        out.lock().push(("forked", child));
        0
    });

    let init = k.manager.spawn_program("/bin/pids", &["pids"]).unwrap();
    k.manager.join(&init);

    let entries = seen.lock().clone();
    let find = |tag: &str| entries.iter().find(|(t, _)| *t == tag).map(|(_, pid)| *pid);
    assert_eq!(find("parent"), Some(init.pid()));
    assert_eq!(find("child"), find("forked"));
    assert_ne!(find("child"), find("parent"));
}

#[test]
fn test_wait_for_non_child_fails() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/stranger", move |ctx| {
        out.lock().push(ctx.waitpid(9999, UserPtr::NULL, 0).unwrap_err());
        out.lock().push(ctx.waitpid(ctx.getpid(), UserPtr::NULL, 0).unwrap_err());
        0
    });

    let init = k.manager.spawn_program("/bin/stranger", &["stranger"]).unwrap();
    k.manager.join(&init);

    for err in seen.lock().iter() {
        assert!(matches!(err, KernelError::NoSuchChild { .. }));
        assert_eq!(err.errno().code(), 16);
    }
}

#[test]
fn test_child_is_reaped_once() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/twice", move |ctx| {
        let child = ctx.fork(|_| 0).unwrap();
        out.lock().push(ctx.waitpid(child, UserPtr::NULL, 0).is_ok());
        out.lock().push(matches!(
            ctx.waitpid(child, UserPtr::NULL, 0),
            Err(KernelError::NoSuchChild { .. })
        ));
        0
    });

    let init = k.manager.spawn_program("/bin/twice", &["twice"]).unwrap();
    k.manager.join(&init);
    assert_eq!(*seen.lock(), vec![true, true]);
}

#[test]
fn test_waitpid_rejects_options() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/options", move |ctx| {
        let child = ctx.fork(|_| 3).unwrap();
        let err = ctx.waitpid(child, UserPtr::NULL, 1).unwrap_err();
        out.lock().push(matches!(err, KernelError::InvalidArgument(_)));
        // The child is still there to reap
        out.lock().push(ctx.waitpid(child, UserPtr::NULL, 0).is_ok());
        0
    });

    let init = k.manager.spawn_program("/bin/options", &["options"]).unwrap();
    k.manager.join(&init);
    assert_eq!(*seen.lock(), vec![true, true]);
}

#[test]
fn test_fork_copies_address_space() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/cow", move |ctx| {
        let buf = ctx.push_str("parent").unwrap();
        let child_log = out.clone();
        let child = ctx
            .fork(move |ctx| {
                child_log.lock().push(ctx.read_str(buf, 16).unwrap());
                ctx.write(buf, b"child!\0").unwrap();
                child_log.lock().push(ctx.read_str(buf, 16).unwrap());
                0
            })
            .unwrap();
        ctx.waitpid(child, UserPtr::NULL, 0).unwrap();
        out.lock().push(ctx.read_str(buf, 16).unwrap());
        0
    });

    let init = k.manager.spawn_program("/bin/cow", &["cow"]).unwrap();
    k.manager.join(&init);
    assert_eq!(*seen.lock(), vec!["parent", "child!", "parent"]);
}

#[test]
fn test_fork_inherits_heap_cursor() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/brk", move |ctx| {
        ctx.alloc(64).unwrap();
        let before = ctx.regs().brk;
        let child_log = out.clone();
        let child = ctx
            .fork(move |ctx| {
                child_log.lock().push(ctx.regs().brk);
                0
            })
            .unwrap();
        ctx.waitpid(child, UserPtr::NULL, 0).unwrap();
        out.lock().push(before);
        0
    });

    let init = k.manager.spawn_program("/bin/brk", &["brk"]).unwrap();
    k.manager.join(&init);
    let seen = seen.lock();
    assert_eq!(seen[0], seen[1]);
}

fn fork_once_program(registry: &ProgramRegistry, seen: super::common::Log<KernelError>) {
    registry.register("/bin/forkonce", move |ctx| {
        match ctx.fork(|_| 0) {
            Ok(pid) => {
                ctx.waitpid(pid, UserPtr::NULL, 0).unwrap();
            }
            Err(e) => seen.lock().push(e),
        }
        0
    });
}

#[test]
fn test_fork_fails_when_tasks_run_out() {
    let registry = Arc::new(ProgramRegistry::new());
    let manager = ProcessManager::builder()
        .with_config(KernelConfig::minimal())
        .with_loader(registry.clone())
        .with_spawner(Arc::new(ThreadSpawner::new(Some(1))))
        .build();
    let seen = log();
    fork_once_program(&registry, seen.clone());

    let init = manager.spawn_program("/bin/forkonce", &["forkonce"]).unwrap();
    manager.join(&init);

    let errors = seen.lock();
    assert!(matches!(
        errors[0],
        KernelError::ResourceExhausted { resource: Resource::Tasks, .. }
    ));
    // Nothing of the half-built child survives
    assert_eq!(manager.process_count(), 0);
    assert_eq!(manager.vm().pages_in_use(), 0);
}

#[test]
fn test_fork_fails_when_memory_runs_out() {
    // Text page plus heap and stack: room for the parent but not a copy
    let one_process = 1 + HEAP_PAGES + USER_STACK_PAGES;
    let registry = Arc::new(ProgramRegistry::new());
    let manager = ProcessManager::builder()
        .with_config(KernelConfig::minimal())
        .with_loader(registry.clone())
        .with_vm(Arc::new(SimVm::new(one_process + one_process / 2)))
        .build();
    let seen = log();
    fork_once_program(&registry, seen.clone());

    let init = manager.spawn_program("/bin/forkonce", &["forkonce"]).unwrap();
    manager.join(&init);

    assert!(matches!(
        seen.lock()[0],
        KernelError::ResourceExhausted { resource: Resource::Memory, .. }
    ));
    assert_eq!(manager.vm().pages_in_use(), 0);
}

#[test]
fn test_fork_fails_when_pids_run_out() {
    let k = kernel_with(KernelConfig {
        max_processes: 1,
        ..KernelConfig::minimal()
    });
    let seen = log();
    fork_once_program(&k.registry, seen.clone());

    let init = k.manager.spawn_program("/bin/forkonce", &["forkonce"]).unwrap();
    k.manager.join(&init);

    let err = &seen.lock()[0];
    assert!(matches!(
        err,
        KernelError::ResourceExhausted { resource: Resource::Pids, .. }
    ));
    assert_eq!(err.errno().code(), 12);
    assert_eq!(k.manager.vm().pages_in_use(), 0);
}

#[test]
fn test_zombie_released_when_parent_exits() {
    let k = kernel();
    let manager = k.manager.clone();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/abandon", move |ctx| {
        let child = ctx.fork(|_| 5).unwrap();
        let exited = wait_until(|| {
            manager
                .get(child)
                .is_some_and(|p| p.state() == ProcessState::Exited)
        });
        out.lock().push(exited);
        out.lock().push(ctx.process().children() == vec![child]);
        0
    });

    let init = k.manager.spawn_program("/bin/abandon", &["abandon"]).unwrap();
    k.manager.join(&init);

    assert_eq!(*seen.lock(), vec![true, true]);
    assert_eq!(k.manager.process_count(), 0);
    assert_eq!(k.manager.list(), vec![]);
}

#[test]
fn test_orphan_released_at_its_own_exit() {
    let k = kernel();
    let release = Arc::new(AtomicBool::new(false));
    let gate = release.clone();
    k.registry.register("/bin/orphan", move |ctx| {
        let gate = gate.clone();
        ctx.fork(move |_| {
            wait_until(|| gate.load(Ordering::SeqCst));
            0
        })
        .unwrap();
        0
    });

    let init = k.manager.spawn_program("/bin/orphan", &["orphan"]).unwrap();
    k.manager.join(&init);

    let listed = k.manager.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].parent, None);
    assert_eq!(listed[0].state, ProcessState::Running);

    release.store(true, Ordering::SeqCst);
    assert!(wait_until(|| k.manager.process_count() == 0));
    assert!(wait_until(|| k.manager.vm().pages_in_use() == 0));
}

#[test]
fn test_list_shows_family() {
    let k = kernel();
    let manager = k.manager.clone();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/family", move |ctx| {
        let gate = Arc::new(AtomicBool::new(false));
        let child_gate = gate.clone();
        let child = ctx
            .fork(move |_| {
                wait_until(|| child_gate.load(Ordering::SeqCst));
                0
            })
            .unwrap();
        out.lock().push(manager.list());
        gate.store(true, Ordering::SeqCst);
        ctx.waitpid(child, UserPtr::NULL, 0).unwrap();
        0
    });

    let init = k.manager.spawn_program("/bin/family", &["family"]).unwrap();
    k.manager.join(&init);

    let listed = &seen.lock()[0];
    assert_eq!(listed.len(), 2);
    let (parent, child) = (&listed[0], &listed[1]);
    assert_eq!(parent.pid, init.pid());
    assert_eq!(parent.children, vec![child.pid]);
    assert_eq!(child.parent, Some(parent.pid));
    assert_eq!(child.name, "/bin/family");
    assert_eq!((parent.tasks, child.tasks), (1, 1));
    assert_eq!(init.task_count(), 0);
}

#[test]
fn test_faulting_child_is_reaped() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/crashy", move |ctx| {
        let status = ctx.alloc(4).unwrap();
        let child = ctx.fork(|_| panic!("user fault")).unwrap();
        ctx.waitpid(child, status, 0).unwrap();
        out.lock().push(WaitStatus::from_raw(ctx.read_i32(status).unwrap()));
        0
    });

    let init = k.manager.spawn_program("/bin/crashy", &["crashy"]).unwrap();
    assert_eq!(k.manager.join(&init), WaitStatus::exited(0));

    let status = seen.lock()[0];
    assert!(status.is_signaled());
    assert_eq!(status.term_signal(), Some(FAULT_SIGNAL));
    assert_eq!(k.manager.process_count(), 0);
    assert_eq!(k.manager.vm().pages_in_use(), 0);
}

#[test]
fn test_faulting_program_releases_launcher() {
    let k = kernel();
    k.registry.register("/bin/abort", |ctx| {
        ctx.alloc(usize::MAX).unwrap();
        0
    });

    let init = k.manager.spawn_program("/bin/abort", &["abort"]).unwrap();
    assert_eq!(k.manager.join(&init), WaitStatus::signaled(FAULT_SIGNAL));
    assert!(wait_until(|| init.state() == ProcessState::Reaped));
    assert!(wait_until(|| k.manager.spawner().live_tasks() == 0));
    assert_eq!(k.manager.vm().pages_in_use(), 0);
}

#[test]
fn test_many_children_reaped() {
    let k = kernel();
    let seen = log();
    let out = seen.clone();
    k.registry.register("/bin/fanout", move |ctx| {
        let pids: Vec<_> = (0..8).map(|i| ctx.fork(move |_| i).unwrap()).collect();
        let status = ctx.alloc(4).unwrap();
        for pid in pids.iter().rev() {
            ctx.waitpid(*pid, status, 0).unwrap();
            out.lock().push(ctx.read_i32(status).unwrap() >> 2);
        }
        0
    });

    let init = k.manager.spawn_program("/bin/fanout", &["fanout"]).unwrap();
    k.manager.join(&init);
    assert_eq!(*seen.lock(), vec![7, 6, 5, 4, 3, 2, 1, 0]);
    assert_eq!(k.manager.process_count(), 0);
}
