//! Object names for uploaded product images.
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase base-36 rendering of `value`
fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// `<millis>-<random base36>.<ext>`, unique enough that uploads never collide
pub fn object_file_name<R: Rng + ?Sized>(now_millis: i64, extension: &str, rng: &mut R) -> String {
    let token = base36(rng.random::<u64>());
    format!("{now_millis}-{token}.{extension}")
}

/// Object path inside the image bucket: one folder per category
pub fn object_path(folder: &str, file_name: &str) -> String {
    format!("{}/{}", folder.trim_matches('/'), file_name)
}
