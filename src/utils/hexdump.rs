use std::cmp;
use std::fmt::Write;

/// Renders `data` as a canonical hexdump (`hexdump -C` style), with addresses starting at
/// `offset`. Used to show rejected records in trace logs.
pub fn hexdump(data: &[u8], offset: u64) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);
    let mut address = 0;

    while address < data.len() {
        let end = cmp::min(address + 16, data.len());
        format_line(&mut out, &data[address..end], address as u64 + offset);
        address += 16;
    }

    out
}

fn format_line(out: &mut String, line: &[u8], address: u64) {
    // Writing to a `String` cannot fail.
    let _ = write!(out, "{:08x}:", address);

    for (i, b) in line.iter().enumerate() {
        if i == 8 {
            out.push(' ');
        }
        let _ = write!(out, " {:02x}", b);
    }

    // align the ASCII column of short lines
    for i in line.len()..16 {
        if i == 8 {
            out.push(' ');
        }
        out.push_str("   ");
    }

    out.push_str("  |");
    for &b in line {
        if b.is_ascii_graphic() || b == b' ' {
            out.push(b as char);
        } else {
            out.push('.');
        }
    }
    out.push_str("|\n");
}
