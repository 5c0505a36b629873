use buildrules_lib::util::hash::Fingerprint;
use serde_json::{Map, Value, json};

fn object(pairs: &[(&str, Value)]) -> Value {
  let mut map = Map::new();
  for (key, value) in pairs {
    map.insert(key.to_string(), value.clone());
  }
  Value::Object(map)
}

#[test]
fn equal_data_equal_fingerprint_regardless_of_insertion_order() {
  let a = object(&[
    ("name", json!("cmake")),
    ("env", object(&[("CC", json!("gcc")), ("CXX", json!("g++"))])),
    ("commands", json!(["make", "make install"])),
  ]);
  let b = object(&[
    ("commands", json!(["make", "make install"])),
    ("env", object(&[("CXX", json!("g++")), ("CC", json!("gcc"))])),
    ("name", json!("cmake")),
  ]);

  assert_eq!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
}

#[test]
fn yaml_and_json_sources_agree() {
  let from_yaml: Value = serde_yaml::from_str("name: cmake\nversion: '3.27'\n").unwrap();
  let from_json = json!({"version": "3.27", "name": "cmake"});

  assert_eq!(Fingerprint::of_value(&from_yaml), Fingerprint::of_value(&from_json));
}

#[test]
fn excluded_fields_are_a_named_policy() {
  let base = json!({"name": "u", "version": "1"});
  let toggled = json!({"name": "u", "version": "1", "remove_after_update": true});

  assert_ne!(Fingerprint::of_value(&base), Fingerprint::of_value(&toggled));
  assert_eq!(
    Fingerprint::of_value_excluding(&base, &["remove_after_update"]),
    Fingerprint::of_value_excluding(&toggled, &["remove_after_update"])
  );
}
