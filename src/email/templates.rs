pub fn render_reset_code(code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Password Reset</h2>
    <p>Use this code to reset your password:</p>
    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold; font-family: monospace;">{code}</p>
    <p style="color: #666; font-size: 14px;">The code expires in {ttl_minutes} minutes and works once. If you didn't request this, you can ignore it.</p>
</body>
</html>"#
    )
}
