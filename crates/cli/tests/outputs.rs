use std::process::{Command, Output};

fn cm3gen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cm3gen"))
        .args(args)
        .output()
        .expect("Failed to execute cm3gen")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_cli_generates_vector_table() {
    let output = cm3gen(&["lm3s9d96"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("handler const vector_table[70] = {"));
    assert!(text.contains("(handler) &__c_stack_top__,"));
    assert!(text.contains("&gpio_a_handler,"));
    assert!(text.contains(
        "void epi_handler(void) __attribute__ ((weak, alias (\"undefined_handler\")));"
    ));
    assert!(text.contains("section(\".isr_vector\")"));
}

#[test]
fn test_cli_output_is_byte_identical() {
    let first = cm3gen(&["lm3s6965"]);
    let second = cm3gen(&["lm3s6965"]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_cli_unknown_chip_rejected() {
    let output = cm3gen(&["stm32f103"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("stm32f103"));
}

#[test]
fn test_cli_missing_chip_prints_usage() {
    let output = cm3gen(&[]);
    assert_eq!(output.status.code(), Some(2)); // EXIT_USAGE
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("No chip identifier supplied"));
    assert!(stderr.contains("Usage:"));
}

#[test]
fn test_cli_help() {
    let output = cm3gen(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Cortex-M3 vector table generator"));
    assert!(text.contains("lm3s9d96"));
}

#[test]
fn test_cli_json_format() {
    let output = cm3gen(&["--format", "json", "lm3s6965"]);
    assert!(output.status.success());

    let map: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(map["chip"], "lm3s6965");
    let vectors = map["vectors"].as_array().unwrap();
    assert_eq!(vectors.len(), 14 + 44);
    assert_eq!(vectors[0]["handler"], "reset_handler");
    assert_eq!(vectors[57]["name"], "hibernate");
    assert_eq!(vectors[57]["irq"], 43);
}

#[test]
fn test_cli_halt_trap() {
    let output = cm3gen(&["--trap", "halt", "lm3s9d96"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(!text.contains("0xe000ed28"));
    assert!(text.contains("void __attribute__ ((naked)) undefined_handler(void) {"));
}

#[test]
fn test_cli_list_chips() {
    let output = cm3gen(&["--list-chips"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("lm3s6965"));
    assert!(text.contains(" 55 interrupts"));
}

#[test]
fn test_cli_decode_fault() {
    let output = cm3gen(&["--decode-fault", "0x8200"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("FAULTSTAT=0x00008200 [PRECISE | BFARV]"));
    assert!(text.contains("Bus fault"));
    assert!(text.contains("bus fault address register is valid"));
}

#[test]
fn test_cli_decode_frame() {
    let output = cm3gen(&[
        "--decode-frame",
        "0,1,2,3,0xc,0xfffffff9,0x1234,0x01000003",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("  pc = 0x00001234"));
    assert!(text.contains("isr=3"));
}

#[test]
fn test_cli_decode_frame_wrong_length() {
    let output = cm3gen(&["--decode-frame", "1,2,3"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_bad_word() {
    let output = cm3gen(&["--decode-fault", "0xZZ"]);
    assert_eq!(output.status.code(), Some(2));
}
