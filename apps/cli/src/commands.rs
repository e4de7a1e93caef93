use std::io::Write;
use std::ptr::{self, NonNull};
use std::slice;

use anyhow::{Context, Result};
use scopestack::{FrameKind, ScopeStack, StackStats, SystemAllocator, local, scope};
use tracing::debug;

/// Runs the concat-and-xor demo on the thread-local stack
pub fn xor(out: &mut dyn Write, a: &str, b: &str, quiet: bool) -> Result<()> {
    let _frame = local::scope(FrameKind::Tree);
    debug!(a_len = a.len(), b_len = b.len(), "running xor demo");
    report(out, quiet, "main before call")?;

    let len = a.len() + b.len();
    let xored = concat_xor42(out, a.as_bytes(), b.as_bytes(), quiet)?;
    // SAFETY: `xored` holds `len` initialised bytes and is owned by `_frame`
    let bytes = unsafe { slice::from_raw_parts(xored.as_ptr(), len) };
    writeln!(out, "xored42: {}", bytes.escape_ascii())?;

    report(out, quiet, "main after call")?;
    Ok(())
}

fn concat_xor42(out: &mut dyn Write, a: &[u8], b: &[u8], quiet: bool) -> Result<NonNull<u8>> {
    scope!(array 4);

    let len = a.len() + b.len();
    let concat = local::allocate(len).context("allocating concatenation buffer")?;
    // SAFETY: `concat` is a fresh block of `len` bytes
    unsafe {
        ptr::copy_nonoverlapping(a.as_ptr(), concat.as_ptr(), a.len());
        ptr::copy_nonoverlapping(b.as_ptr(), concat.as_ptr().add(a.len()), b.len());
    }

    report(out, quiet, "concat_xor42 before xor42")?;
    // SAFETY: `concat` was fully initialised above and stays alive in this frame
    let xored = xor42(out, unsafe { slice::from_raw_parts(concat.as_ptr(), len) }, quiet)?;
    report(out, quiet, "concat_xor42 before promote")?;
    local::promote(xored)?;
    report(out, quiet, "concat_xor42 after promote")?;

    Ok(xored)
}

fn xor42(out: &mut dyn Write, input: &[u8], quiet: bool) -> Result<NonNull<u8>> {
    scope!();

    let xored = local::allocate(input.len()).context("allocating xor buffer")?;
    for (i, byte) in input.iter().enumerate() {
        // SAFETY: `xored` holds `input.len()` bytes
        unsafe { xored.as_ptr().add(i).write(byte ^ 42) };
    }

    report(out, quiet, "xor42 before promote")?;
    local::promote(xored)?;
    report(out, quiet, "xor42 after promote")?;

    Ok(xored)
}

fn report(out: &mut dyn Write, quiet: bool, label: &str) -> Result<()> {
    if !quiet {
        writeln!(out, "STACK at {label}")?;
        write!(out, "{}", local::dump())?;
    }
    Ok(())
}

/// Fills `depth` nested frames and prints the stack from the innermost one
pub fn dump(out: &mut dyn Write, depth: usize, allocations: usize, kind: FrameKind, stats: bool) -> Result<()> {
    let stack = ScopeStack::new(SystemAllocator::new());
    debug!(depth, allocations, %kind, "filling frames");

    // frames left open by an error are popped top-down when `stack` drops
    for level in 1..=depth {
        let frame = stack
            .try_enter_frame(kind)
            .with_context(|| format!("pushing frame {level} of {depth}"))?;
        for n in 0..allocations {
            stack
                .allocate(16)
                .with_context(|| format!("allocation {} in frame {frame}", n + 1))?;
        }
    }
    write!(out, "{}", stack.dump())?;

    for _ in 0..depth {
        stack.pop_frame()?;
    }

    if stats {
        print_stats(out, &stack.stats())?;
    }
    Ok(())
}

fn print_stats(out: &mut dyn Write, stats: &StackStats) -> Result<()> {
    writeln!(out, "frames pushed:        {}", stats.frames_pushed)?;
    writeln!(out, "frames popped:        {}", stats.frames_popped)?;
    writeln!(out, "peak depth:           {}", stats.peak_depth)?;
    writeln!(out, "tracked allocations:  {}", stats.tracked_allocations)?;
    writeln!(out, "released at exit:     {}", stats.exit_releases)?;
    writeln!(out, "tracking failures:    {}", stats.tracking_failures)?;
    Ok(())
}
