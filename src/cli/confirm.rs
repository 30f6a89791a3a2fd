use std::io::{self, BufRead, Write};
use std::path::Path;

/// Ask before wiping the ledger at `ledger_path`. Only an explicit `y` or
/// `yes` confirms; an empty answer or closed input declines.
pub fn confirm_clear_ledger(
    ledger_path: &Path,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    write!(
        output,
        "Forget every file recorded in {}? They will be copied again on the next scan. (y/N): ",
        ledger_path.display()
    )?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
