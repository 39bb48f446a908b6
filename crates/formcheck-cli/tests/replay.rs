//! Integration tests for scenario replay.

use formcheck_cli::scenario::{Scenario, replay};
use formcheck_validate::EngineConfig;
use serde_json::{Value, json};

fn field(id: &str, rules: Value) -> Value {
    json!({
        "tag": "p",
        "children": [{
            "tag": "input",
            "attributes": { "id": id, "name": id, "data-rules": rules.to_string() }
        }]
    })
}

fn signup_form() -> Value {
    json!({
        "tag": "form",
        "children": [
            { "tag": "div", "classes": ["formcheck-messages--global"] },
            field("ico", json!([
                { "op": ":filled", "msg": "Enter the company ID" },
                { "op": "Formcheck\\Rules::czechCompanyIdentifier", "msg": "Wrong checksum" },
                {
                    "op": "Formcheck\\Rules::remote",
                    "arg": { "ajaxUrl": "/ico", "dependentInputs": { "companyName": "company" } },
                    "msg": { "invalid": "Unknown company" }
                }
            ])),
            field("company", json!([{ "op": ":filled", "msg": "Enter the company name" }])),
            field("street", json!([
                { "op": "Formcheck\\Rules::containsNumber", "msg": "Add a house number" }
            ]))
        ]
    })
}

fn scenario(steps: Value) -> Scenario {
    serde_json::from_value(json!({
        "name": "company signup",
        "form": signup_form(),
        "steps": steps
    }))
    .expect("scenario")
}

#[test]
fn company_signup_report() {
    let scenario = scenario(json!([
        { "action": "focus", "control": "ico" },
        { "action": "input", "control": "ico", "value": "25596641" },
        { "action": "blur", "control": "ico" },
        {
            "action": "respond",
            "control": "ico",
            "response": { "valid": true, "dependentInputs": { "company": "Acme" } }
        },
        { "action": "focus", "control": "street" },
        { "action": "input", "control": "street", "value": "Main street" },
        { "action": "blur", "control": "street" },
        { "action": "submit" }
    ]));
    let report = replay(&scenario, EngineConfig::default()).expect("replay");
    assert!(report.is_blocked());

    let rendered = serde_json::to_string_pretty(&report).expect("json");
    insta::assert_snapshot!(rendered, @r#"
    {
      "name": "company signup",
      "submitted": false,
      "pending": 1,
      "controls": [
        {
          "control": "ico",
          "value": "25596641",
          "state": [],
          "loading": true,
          "messages": []
        },
        {
          "control": "company",
          "value": "Acme",
          "state": [],
          "loading": false,
          "messages": []
        },
        {
          "control": "street",
          "value": "Main street",
          "state": [
            "error"
          ],
          "loading": false,
          "messages": [
            {
              "severity": "error",
              "text": "Add a house number",
              "async": false
            }
          ]
        }
      ]
    }
    "#);
}

#[test]
fn dependent_fill_marks_company_valid_before_submit() {
    let scenario = scenario(json!([
        { "action": "focus", "control": "ico" },
        { "action": "input", "control": "ico", "value": "25596641" },
        { "action": "blur", "control": "ico" },
        {
            "action": "respond",
            "control": "ico",
            "response": { "valid": true, "dependentInputs": { "company": "Acme" } }
        }
    ]));
    let report = replay(&scenario, EngineConfig::default()).expect("replay");
    assert_eq!(report.submitted, None);
    assert_eq!(report.pending, 0);
    let company = &report.controls[1];
    assert_eq!(company.value, "Acme");
    assert_eq!(
        serde_json::to_value(&company.state).expect("json"),
        json!(["valid"])
    );
}

#[test]
fn remote_timeout_does_not_block_submit() {
    let scenario = scenario(json!([
        { "action": "input", "control": "ico", "value": "25596641" },
        { "action": "input", "control": "company", "value": "Acme" },
        { "action": "input", "control": "street", "value": "Main street 12" },
        { "action": "submit" },
        { "action": "respond", "control": "ico", "timeout": true }
    ]));
    let report = replay(&scenario, EngineConfig::default()).expect("replay");
    assert_eq!(report.submitted, Some(true));
    assert_eq!(report.pending, 0);
}

#[test]
fn respond_without_outstanding_check_fails() {
    let scenario = scenario(json!([
        { "action": "respond", "control": "ico", "timeout": true }
    ]));
    let err = replay(&scenario, EngineConfig::default()).expect_err("nothing to answer");
    let message = format!("{err:#}");
    assert!(message.contains("step 1"));
    assert!(message.contains("no outstanding remote check for 'ico'"));
}

#[test]
fn unknown_control_is_reported() {
    let scenario = scenario(json!([{ "action": "blur", "control": "vat" }]));
    let err = replay(&scenario, EngineConfig::default()).expect_err("unknown control");
    assert!(format!("{err:#}").contains("unknown control: vat"));
}

#[test]
fn rules_table_flattens_conditions() {
    let declaration = json!([
        { "op": ":filled", "rules": [{ "op": ":minLength", "arg": 3, "msg": "Too short" }] },
        { "op": "Formcheck\\Rules::remote", "arg": { "ajaxUrl": "/ico" } }
    ])
    .to_string();
    let rules = formcheck_validate::parse_rules("ico", &declaration).expect("rules");
    let table = formcheck_cli::report::rules_table(&rules);
    assert_eq!(table.row_iter().count(), 3);
}
