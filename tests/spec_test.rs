use serde::Deserialize;
use serde_json::Value;
use std::fs;

#[derive(Deserialize)]
struct TestSuite {
    description: String,
    #[serde(default)]
    draft: Option<i64>,
    schema: Value,
    tests: Vec<TestCase>,
}

#[derive(Deserialize)]
struct TestCase {
    description: String,
    data: Value,
    valid: bool,
}

#[test]
fn spec() -> Result<(), std::io::Error> {
    let mut test_files = fs::read_dir("tests/suite")?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    test_files.sort();

    for path in test_files {
        println!("{:?}", &path);
        let file = fs::read(&path)?;
        let suites: Vec<TestSuite> = serde_json::from_slice(&file)?;

        for suite in suites {
            println!("{}", suite.description);
            let schema = jsv::compile(&suite.schema, suite.draft).unwrap_or_else(|error| {
                panic!("{:?}: {}: {}", path, suite.description, error)
            });

            for test_case in suite.tests {
                println!("{} / {}", suite.description, test_case.description);
                assert_eq!(
                    schema.is_valid(&test_case.data),
                    test_case.valid,
                    "{}: {}",
                    suite.description,
                    test_case.description
                );
                // Both evaluation modes must agree.
                assert_eq!(
                    schema.iter_errors(&test_case.data).next().is_none(),
                    test_case.valid,
                    "{}: {} (iter_errors)",
                    suite.description,
                    test_case.description
                );
            }
        }
    }

    Ok(())
}
