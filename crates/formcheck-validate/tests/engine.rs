//! Validation passes, remote resolution and message reconciliation.

use std::cell::Cell;
use std::rc::Rc;

use formcheck_model::{
    Document, Markup, NodeId, RemoteCompletion, RemoteResponse, RuleDescriptor, Severity,
};
use formcheck_validate::validators::{CONTAINS_NUMBER, CZECH_COMPANY_IDENTIFIER, REMOTE};
use formcheck_validate::{
    EngineConfig, FormEvent, FormValidator, QueuedTransport, RenderedMessage, ValidatorRegistry,
    normalize,
};
use serde_json::json;

fn input(id: &str, value: &str, rules: &str) -> Markup {
    Markup::new("div").class("formcheck-messages--input").child(
        Markup::new("input")
            .attr("id", id)
            .attr("name", id)
            .attr("value", value)
            .attr("data-rules", rules),
    )
}

fn document(children: Vec<Markup>) -> Document {
    let mut form = Markup::new("form")
        .attr("id", "signup")
        .child(Markup::new("div").class("formcheck-messages--global"));
    for child in children {
        form = form.child(child);
    }
    Document::from_markup(&form)
}

fn node(doc: &Document, id: &str) -> NodeId {
    doc.element_by_id(id).expect("control in document")
}

fn validator() -> FormValidator<QueuedTransport> {
    FormValidator::with_builtins(EngineConfig::default(), QueuedTransport::new())
}

fn messages(
    validator: &FormValidator<QueuedTransport>,
    doc: &Document,
    control: NodeId,
) -> Vec<RenderedMessage> {
    validator.reconciler().messages_for(doc, control)
}

fn remote_rule(arg: serde_json::Value) -> RuleDescriptor {
    RuleDescriptor::new("Formcheck\\Rules::remote").with_arg(arg)
}

#[test]
fn mandatory_failure_short_circuits() {
    let evaluated = Rc::new(Cell::new(0));
    let counter = Rc::clone(&evaluated);
    let mut registry = ValidatorRegistry::with_builtins();
    registry.insert("lengthCheck", move |_, _, value| {
        counter.set(counter.get() + 1);
        value.len() > 5
    });

    let mut doc = document(vec![input("street", "abc", "")]);
    let street = node(&doc, "street");
    let rules = normalize([
        RuleDescriptor::new("Formcheck\\Rules::containsNumber").with_message("Add a house number"),
        RuleDescriptor::new("lengthCheck")
            .with_arg(json!({ "optional": true }))
            .with_message("too short"),
    ]);
    assert_eq!(rules[0].operation, CONTAINS_NUMBER);

    let mut validator =
        FormValidator::new(EngineConfig::default(), registry, QueuedTransport::new());
    assert!(!validator.validate_control(&mut doc, street, &rules, false));
    assert_eq!(evaluated.get(), 0);

    let shown = messages(&validator, &doc, street);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].text, "Add a house number");
    assert_eq!(shown[0].severity, Some(Severity::Error));
}

#[test]
fn optional_failure_never_blocks() {
    let mut doc = document(vec![input("ico", "25596642", "")]);
    let ico = node(&doc, "ico");
    let rules = normalize([RuleDescriptor::new("Formcheck\\Rules::czechCompanyIdentifier")
        .with_arg(json!({ "optional": true }))
        .with_message("Please double-check the number")]);
    assert_eq!(rules[0].operation, CZECH_COMPANY_IDENTIFIER);

    let mut validator = validator();
    assert!(validator.validate_control(&mut doc, ico, &rules, false));
    let shown = messages(&validator, &doc, ico);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].severity, Some(Severity::Info));
    assert_eq!(
        validator.reconciler().placeholder_state(&doc, ico),
        vec![Severity::Info]
    );
}

#[test]
fn many_optional_failures_still_pass() {
    let mut doc = document(vec![input("nick", "x", "")]);
    let nick = node(&doc, "nick");
    let rules = normalize([
        RuleDescriptor::new("email")
            .with_arg(json!({ "optional": true }))
            .with_message("not an e-mail"),
        RuleDescriptor::new("integer")
            .with_arg(json!({ "optional": true }))
            .with_message("not a number"),
    ]);
    let mut validator = validator();
    assert!(validator.validate_control(&mut doc, nick, &rules, false));
    assert_eq!(messages(&validator, &doc, nick).len(), 2);
}

#[test]
fn optional_async_rejection_renders_info() {
    let mut doc = document(vec![input("email", "taken@example.com", "")]);
    let email = node(&doc, "email");
    let rules = normalize([remote_rule(json!({ "ajaxUrl": "/email", "optional": true }))
        .with_message("Invalid e-mail")]);

    let mut validator = validator();
    assert!(validator.validate_control(&mut doc, email, &rules, false));
    assert!(validator.is_loading(email));

    let request = validator.transport_mut().pop_front().expect("request sent");
    assert_eq!(request.url, "/email");
    assert_eq!(request.operation(), REMOTE);
    assert_eq!(request.parameters.input_value, "taken@example.com");
    assert_eq!(request.timeout.as_millis(), 5000);

    let response = RemoteResponse::invalid()
        .with_status("invalid")
        .with_message("Already registered");
    let live = validator
        .resolve(&mut doc, &request.ticket, RemoteCompletion::Response(response))
        .expect("resolve");
    assert!(live);
    assert!(!validator.is_loading(email));

    let shown = messages(&validator, &doc, email);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].text, "Already registered");
    assert_eq!(shown[0].severity, Some(Severity::Info));
    assert!(shown[0].async_originated);
}

#[test]
fn timeout_uses_timeout_message_and_does_not_block() {
    let rules_json = json!([{
        "op": "Formcheck\\Rules::remote",
        "arg": { "ajaxUrl": "/ico" },
        "msg": { "invalid": "Unknown company", "timeout": "Could not verify right now" }
    }])
    .to_string();
    let mut doc = document(vec![input("ico", "25596641", &rules_json)]);
    let ico = node(&doc, "ico");
    let form = node(&doc, "signup");

    let mut validator = validator();
    let rules = validator.rules_for(&doc, ico).expect("rules");
    validator.validate_control(&mut doc, ico, &rules, false);
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(&mut doc, &request.ticket, RemoteCompletion::TimedOut)
        .expect("resolve");

    let shown = messages(&validator, &doc, ico);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].text, "Could not verify right now");
    assert_eq!(shown[0].severity, Some(Severity::Info));

    assert!(validator.validate_form(&mut doc, form).expect("form"));
    // the async message survives the synchronous pass
    assert_eq!(messages(&validator, &doc, ico).len(), 1);
}

#[test]
fn timeout_severity_policy_renders_error() {
    let mut doc = document(vec![input("ico", "25596641", "")]);
    let ico = node(&doc, "ico");
    let rules = normalize([remote_rule(json!({
        "ajaxUrl": "/ico",
        "msg": { "timeout": "Try again later" }
    }))]);
    let config = EngineConfig {
        timeout_severity_error: true,
        ..EngineConfig::default()
    };
    let mut validator = FormValidator::with_builtins(config, QueuedTransport::new());
    validator.validate_control(&mut doc, ico, &rules, false);
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(&mut doc, &request.ticket, RemoteCompletion::TimedOut)
        .expect("resolve");
    assert_eq!(
        messages(&validator, &doc, ico)[0].severity,
        Some(Severity::Error)
    );
}

#[test]
fn superseded_check_result_is_dropped() {
    let mut doc = document(vec![input("email", "a@example.com", "")]);
    let email = node(&doc, "email");
    let rules = normalize([remote_rule(json!({ "ajaxUrl": "/email" }))]);

    let mut validator = validator();
    validator.validate_control(&mut doc, email, &rules, false);
    validator.validate_control(&mut doc, email, &rules, false);
    assert_eq!(validator.transport().len(), 2);
    assert_eq!(validator.queue().len(), 1);

    let first = validator.transport_mut().pop_front().expect("first");
    let second = validator.transport_mut().pop_front().expect("second");

    let before = doc.to_html(doc.root());
    let stale = RemoteResponse::invalid().with_message("stale answer");
    assert!(
        !validator
            .resolve(&mut doc, &first.ticket, RemoteCompletion::Response(stale))
            .expect("resolve")
    );
    assert_eq!(doc.to_html(doc.root()), before);
    assert!(validator.is_loading(email));

    let fresh = RemoteResponse::invalid().with_message("fresh answer");
    assert!(
        validator
            .resolve(&mut doc, &second.ticket, RemoteCompletion::Response(fresh))
            .expect("resolve")
    );
    let shown = messages(&validator, &doc, email);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].text, "fresh answer");
    assert_eq!(shown[0].severity, Some(Severity::Error));
}

#[test]
fn valid_response_without_text_marks_valid() {
    let mut doc = document(vec![input("email", "free@example.com", "")]);
    let email = node(&doc, "email");
    let rules = normalize([remote_rule(json!({ "ajaxUrl": "/email" }))]);
    let mut validator = validator();
    validator.validate_control(&mut doc, email, &rules, false);
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(
            &mut doc,
            &request.ticket,
            RemoteCompletion::Response(RemoteResponse::valid()),
        )
        .expect("resolve");
    assert!(messages(&validator, &doc, email).is_empty());
    assert_eq!(
        validator.reconciler().placeholder_state(&doc, email),
        vec![Severity::Valid]
    );
}

#[test]
fn transport_failure_uses_status_text_message() {
    let mut doc = document(vec![input("email", "x@example.com", "")]);
    let email = node(&doc, "email");
    let rules = normalize([remote_rule(json!({
        "ajaxUrl": "/email",
        "msg": { "error": "Service unavailable" }
    }))]);
    let mut validator = validator();
    validator.validate_control(&mut doc, email, &rules, false);
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(
            &mut doc,
            &request.ticket,
            RemoteCompletion::Failed("error".into()),
        )
        .expect("resolve");
    let shown = messages(&validator, &doc, email);
    assert_eq!(shown[0].text, "Service unavailable");
    assert_eq!(shown[0].severity, Some(Severity::Error));
}

#[test]
fn dependent_inputs_fill_empty_controls_only() {
    let ico_rules = json!([{
        "op": "Formcheck\\Rules::remote",
        "arg": {
            "ajaxUrl": "/ico",
            "dependentInputs": { "companyName": "company-name" }
        }
    }])
    .to_string();
    let name_rules = json!([{ "op": ":filled", "msg": "Enter the company name" }]).to_string();

    for (initial, expected, revalidated) in [("", "Acme", true), ("Mine", "Mine", false)] {
        let mut doc = document(vec![
            input("ico", "25596641", &ico_rules),
            input("company-name", initial, &name_rules),
        ]);
        let ico = node(&doc, "ico");
        let company = node(&doc, "company-name");

        let mut validator = validator();
        validator
            .handle_event(&mut doc, ico, &FormEvent::Focus)
            .expect("focus");
        assert_eq!(
            validator
                .handle_event(&mut doc, ico, &FormEvent::Blur)
                .expect("blur"),
            Some(true)
        );
        let request = validator.transport_mut().pop_front().expect("request sent");
        assert_eq!(
            request.parameters.dependent_inputs["companyName"].value,
            initial
        );

        let response = RemoteResponse::valid().with_dependent_input("company-name", json!("Acme"));
        validator
            .resolve(&mut doc, &request.ticket, RemoteCompletion::Response(response))
            .expect("resolve");

        assert_eq!(doc.value(company), expected);
        assert_eq!(validator.is_ever_focused(company), revalidated);
        let state = validator.reconciler().placeholder_state(&doc, company);
        assert_eq!(state.contains(&Severity::Valid), revalidated);
    }
}

#[test]
fn invalid_response_does_not_fill_dependents() {
    let mut doc = document(vec![input("ico", "25596641", ""), input("company-name", "", "")]);
    let ico = node(&doc, "ico");
    let company = node(&doc, "company-name");
    let rules = normalize([remote_rule(json!({
        "ajaxUrl": "/ico",
        "dependentInputs": { "companyName": "company-name" }
    }))]);
    let mut validator = validator();
    validator.validate_control(&mut doc, ico, &rules, false);
    let request = validator.transport_mut().pop_front().expect("request sent");
    let response = RemoteResponse::invalid().with_dependent_input("company-name", json!("Acme"));
    validator
        .resolve(&mut doc, &request.ticket, RemoteCompletion::Response(response))
        .expect("resolve");
    assert_eq!(doc.value(company), "");
}

#[test]
fn side_effect_runs_even_for_silent_checks() {
    let mut doc = document(vec![input("ico", "25596641", "")]);
    let ico = node(&doc, "ico");
    let rules = normalize([remote_rule(json!({ "ajaxUrl": "/ico" })).with_message("Unknown")]);

    let mut validator = validator();
    validator
        .side_effects_mut()
        .insert(REMOTE, |doc, control, response, _argument| {
            let verdict = if response.is_some_and(|r| r.valid) {
                "ok"
            } else {
                "nok"
            };
            doc.set_attr(control, "data-company-check", verdict);
        });

    assert!(validator.validate_control(&mut doc, ico, &rules, true));
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(
            &mut doc,
            &request.ticket,
            RemoteCompletion::Response(RemoteResponse::invalid()),
        )
        .expect("resolve");

    assert_eq!(doc.attr(ico, "data-company-check"), Some("nok"));
    assert!(messages(&validator, &doc, ico).is_empty());
}

#[test]
fn shared_placeholder_shows_one_error() {
    let rules = json!([{ "op": ":filled", "msg": "Required" }]).to_string();
    let mut doc = document(vec![
        Markup::new("div")
            .class("formcheck-messages--input")
            .child(
                Markup::new("input")
                    .attr("id", "street")
                    .attr("name", "street")
                    .attr("data-rules", rules.as_str()),
            )
            .child(
                Markup::new("input")
                    .attr("id", "city")
                    .attr("name", "city")
                    .attr("data-rules", rules.as_str()),
            ),
    ]);
    let form = node(&doc, "signup");
    let street = node(&doc, "street");
    let city = node(&doc, "city");

    let mut validator = validator();
    assert!(!validator.validate_form(&mut doc, form).expect("form"));
    assert_eq!(messages(&validator, &doc, street).len(), 1);
    assert!(messages(&validator, &doc, city).is_empty());
}

#[test]
fn validation_group_revalidates_touched_members() {
    let rules = json!([{ "op": ":filled", "msg": "Required" }]).to_string();
    let grouped = |id: &str| {
        Markup::new("div").class("formcheck-messages--input").child(
            Markup::new("input")
                .attr("id", id)
                .attr("name", id)
                .attr("data-rules", rules.as_str())
                .attr("data-validation-group", "address"),
        )
    };
    let mut doc = document(vec![grouped("street"), grouped("city"), grouped("zip")]);
    let street = node(&doc, "street");
    let city = node(&doc, "city");
    let zip = node(&doc, "zip");

    let mut validator = validator();
    validator
        .handle_event(&mut doc, city, &FormEvent::Focus)
        .expect("focus");
    validator
        .handle_event(&mut doc, street, &FormEvent::Focus)
        .expect("focus");
    validator
        .handle_event(&mut doc, street, &FormEvent::Blur)
        .expect("blur");

    assert_eq!(messages(&validator, &doc, street).len(), 1);
    assert_eq!(messages(&validator, &doc, city).len(), 1);
    assert!(messages(&validator, &doc, zip).is_empty());
}

#[test]
fn malformed_declaration_is_an_error() {
    let mut doc = document(vec![input("street", "", "[{\"arg\": 1}]")]);
    let street = node(&doc, "street");
    let mut validator = validator();
    validator.mark_focused(street);
    let err = validator
        .validate_input(&mut doc, street)
        .expect_err("missing op");
    assert!(err.to_string().contains("street"));
}

fn texts(
    validator: &FormValidator<QueuedTransport>,
    doc: &Document,
    control: NodeId,
) -> Vec<(String, bool)> {
    messages(validator, doc, control)
        .into_iter()
        .map(|m| (m.text, m.async_originated))
        .collect()
}

#[test]
fn sync_failure_replaces_stale_async_message() {
    let mut doc = document(vec![input("company", "Acme Corp", "")]);
    let company = node(&doc, "company");
    let rules = normalize([
        RuleDescriptor::new("minLength")
            .with_arg(json!(3))
            .with_message("Too short"),
        remote_rule(json!({ "ajaxUrl": "/company" })).with_message("Unknown company"),
    ]);

    let mut validator = validator();
    assert!(validator.validate_control(&mut doc, company, &rules, false));
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(
            &mut doc,
            &request.ticket,
            RemoteCompletion::Response(RemoteResponse::invalid()),
        )
        .expect("resolve");
    assert_eq!(
        texts(&validator, &doc, company),
        vec![("Unknown company".to_string(), true)]
    );

    doc.set_value(company, "ab");
    assert!(!validator.validate_control(&mut doc, company, &rules, false));
    assert_eq!(
        texts(&validator, &doc, company),
        vec![("Too short".to_string(), false)]
    );
    assert!(validator.transport().is_empty());
}

#[test]
fn message_less_condition_keeps_shown_messages() {
    let mut doc = document(vec![input("company", "Acme", "")]);
    let company = node(&doc, "company");
    let silent = normalize([
        RuleDescriptor::new(":filled")
            .with_rules(vec![RuleDescriptor::new(":minLength").with_arg(json!(3))]),
        remote_rule(json!({ "ajaxUrl": "/company", "optional": true }))
            .with_message("Unknown company"),
    ]);

    let mut validator = validator();
    assert!(validator.validate_control(&mut doc, company, &silent, false));
    let request = validator.transport_mut().pop_front().expect("request sent");
    validator
        .resolve(
            &mut doc,
            &request.ticket,
            RemoteCompletion::Response(RemoteResponse::invalid()),
        )
        .expect("resolve");

    // neither the condition nor its child carries text, the async result stays
    doc.set_value(company, "ab");
    assert!(!validator.validate_control(&mut doc, company, &silent, false));
    assert_eq!(
        texts(&validator, &doc, company),
        vec![("Unknown company".to_string(), true)]
    );
    assert!(
        validator
            .reconciler()
            .placeholder_state(&doc, company)
            .contains(&Severity::Error)
    );

    // the child's text supersedes the async result and survives its parent
    let described = normalize([RuleDescriptor::new(":filled").with_rules(vec![
        RuleDescriptor::new(":minLength")
            .with_arg(json!(3))
            .with_message("Too short"),
    ])]);
    assert!(!validator.validate_control(&mut doc, company, &described, false));
    assert_eq!(
        texts(&validator, &doc, company),
        vec![("Too short".to_string(), false)]
    );
}

#[test]
fn side_effect_runs_when_dependent_revalidation_fails() {
    let mut doc = document(vec![
        input("ico", "25596641", ""),
        input("company-name", "", "[{\"arg\": 1}]"),
    ]);
    let ico = node(&doc, "ico");
    let company = node(&doc, "company-name");
    let rules = normalize([remote_rule(json!({
        "ajaxUrl": "/ico",
        "dependentInputs": { "companyName": "company-name" }
    }))]);

    let mut validator = validator();
    validator
        .side_effects_mut()
        .insert(REMOTE, |doc, control, _response, _argument| {
            doc.set_attr(control, "data-company-check", "done");
        });
    validator.validate_control(&mut doc, ico, &rules, false);
    let request = validator.transport_mut().pop_front().expect("request sent");

    let response = RemoteResponse::valid().with_dependent_input("company-name", json!("Acme"));
    let err = validator
        .resolve(&mut doc, &request.ticket, RemoteCompletion::Response(response))
        .expect_err("dependent rules are malformed");
    assert!(err.to_string().contains("company-name"));

    assert_eq!(doc.attr(ico, "data-company-check"), Some("done"));
    assert_eq!(doc.value(company), "Acme");
    assert!(!validator.has_pending());
    assert!(!validator.is_loading(ico));
}

#[test]
fn removed_control_resolution_skips_side_effect_and_state() {
    let mut doc = document(vec![input("ico", "25596641", ""), input("street", "", "")]);
    let ico = node(&doc, "ico");
    let street = node(&doc, "street");
    let form = node(&doc, "signup");
    let rules = normalize([remote_rule(json!({ "ajaxUrl": "/ico" }))]);

    let fired = Rc::new(Cell::new(false));
    let mut validator = validator();
    let flag = Rc::clone(&fired);
    validator
        .side_effects_mut()
        .insert(REMOTE, move |_doc, _control, _response, _argument| {
            flag.set(true);
        });

    validator.validate_control(&mut doc, ico, &rules, false);
    assert!(validator.state(ico).is_some());
    let request = validator.transport_mut().pop_front().expect("request sent");
    doc.remove(ico);

    let live = validator
        .resolve(
            &mut doc,
            &request.ticket,
            RemoteCompletion::Response(RemoteResponse::valid()),
        )
        .expect("resolve");
    assert!(live);
    assert!(!fired.get());
    assert!(validator.state(ico).is_none());
    assert!(!validator.has_pending());

    validator.mark_focused(street);
    doc.remove(street);
    validator.validate_form(&mut doc, form).expect("form pass");
    assert!(validator.state(street).is_none());
}
