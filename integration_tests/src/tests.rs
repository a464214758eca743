//! Integration test cases.

use std::time::Duration;

use colored::Colorize;

use crate::device::DeviceClient;
use crate::protocol::{is_valid_address, is_valid_device_name, mouse_line};

/// Test result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: Some(message.to_string()),
        }
    }
}

/// Run a test function and print results as it happens.
fn run_test<F>(name: &str, device: &mut DeviceClient, test_fn: F) -> TestResult
where
    F: FnOnce(&mut DeviceClient) -> TestResult,
{
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    let mut result = test_fn(device);
    result.name = name.to_string();

    if result.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("    {}", msg.red());
        }
    }

    result
}

/// Run all tests and return results.
pub fn run_all_tests(device: &mut DeviceClient) -> Vec<TestResult> {
    let mut results = Vec::new();

    results.push(run_test("getDeviceId returns device name", device, test_device_name));
    results.push(run_test("getDeviceId is stable", device, test_device_name_stable));
    results.push(run_test("getConnectedAddress reply is well formed", device, test_connected_address));
    results.push(run_test("Report lines produce no serial output", device, test_report_lines_silent));
    results.push(run_test("CRLF and CR terminators accepted", device, test_line_terminators));
    results.push(run_test("Overlong line is discarded", device, test_overlong_line));

    results
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        if result.passed {
            println!("  {} {}", "[PASS]".green().bold(), result.name);
            passed += 1;
        } else {
            println!("  {} {}", "[FAIL]".red().bold(), result.name);
            if let Some(msg) = &result.message {
                println!("         {}", msg.red());
            }
            failed += 1;
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

// --- Individual Tests ---

fn test_device_name(device: &mut DeviceClient) -> TestResult {
    match device.device_name() {
        Ok(name) if is_valid_device_name(&name) => {
            print!("({}) ", name);
            TestResult::pass("test")
        }
        Ok(name) => TestResult::fail("test", &format!("Malformed device name {:?}", name)),
        Err(e) => TestResult::fail("test", &format!("Error: {}", e)),
    }
}

fn test_device_name_stable(device: &mut DeviceClient) -> TestResult {
    let first = match device.device_name() {
        Ok(name) => name,
        Err(e) => return TestResult::fail("test", &format!("Error: {}", e)),
    };

    for i in 0..5 {
        match device.device_name() {
            Ok(name) if name == first => {}
            Ok(name) => {
                return TestResult::fail(
                    "test",
                    &format!("Query {} returned {:?}, expected {:?}", i + 2, name, first),
                );
            }
            Err(e) => return TestResult::fail("test", &format!("Query {} error: {}", i + 2, e)),
        }
    }

    TestResult::pass("test")
}

fn test_connected_address(device: &mut DeviceClient) -> TestResult {
    match device.connected_address() {
        Ok(None) => {
            print!("(no peer) ");
            TestResult::pass("test")
        }
        Ok(Some(address)) if is_valid_address(&address) => {
            print!("({}) ", address);
            TestResult::pass("test")
        }
        Ok(Some(address)) => TestResult::fail("test", &format!("Malformed address {:?}", address)),
        Err(e) => TestResult::fail("test", &format!("Error: {}", e)),
    }
}

fn test_report_lines_silent(device: &mut DeviceClient) -> TestResult {
    for line in [mouse_line(0, 0, 0), "1".to_string(), "abc def".to_string(), mouse_line(0, 0, 0)] {
        if let Err(e) = device.send_line(&line) {
            return TestResult::fail("test", &format!("Error: {}", e));
        }
    }

    match device.expect_silence(Duration::from_millis(300)) {
        Ok(()) => TestResult::pass("test"),
        Err(e) => TestResult::fail("test", &e.to_string()),
    }
}

fn test_line_terminators(device: &mut DeviceClient) -> TestResult {
    for terminator in ["\r\n", "\r"] {
        let query = format!("{}{}", crate::protocol::DEVICE_ID_QUERY, terminator);
        if let Err(e) = device.send_raw(query.as_bytes()) {
            return TestResult::fail("test", &format!("Error: {}", e));
        }
        match device.read_line() {
            Ok(line) if crate::protocol::parse_device_name(&line).is_some() => {}
            Ok(line) => {
                return TestResult::fail(
                    "test",
                    &format!("Terminator {:?}: unexpected reply {:?}", terminator, line),
                );
            }
            Err(e) => {
                return TestResult::fail("test", &format!("Terminator {:?}: {}", terminator, e));
            }
        }
    }

    TestResult::pass("test")
}

fn test_overlong_line(device: &mut DeviceClient) -> TestResult {
    // Longer than the firmware's 50 byte line limit
    let long = "9 ".repeat(60);
    if let Err(e) = device.send_line(&long) {
        return TestResult::fail("test", &format!("Error: {}", e));
    }

    match device.device_name() {
        Ok(_) => TestResult::pass("test"),
        Err(e) => TestResult::fail("test", &format!("Query after overlong line failed: {}", e)),
    }
}
