use anyhow::Result;

use tierup::{cascade, Interval};

pub fn exec(interval: String) -> Result<()> {
    let interval: Interval = interval.parse()?;
    for (i, iv) in cascade(interval).into_iter().enumerate() {
        println!("{}. {} (level {})", i + 1, iv, iv.level());
    }
    Ok(())
}
