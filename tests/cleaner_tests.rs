use saffi::{
    classify, ratios, ContentCleaner, InterleavePolicy, Lang, PatternLibrary, ScriptKind,
};

fn default_cleaner() -> ContentCleaner {
    ContentCleaner::new(PatternLibrary::builtin(), InterleavePolicy::DropMinority)
}

#[test]
fn classify_empty_returns_no_spans() {
    assert!(classify("").is_empty());
}

#[test]
fn classify_merges_adjacent_same_script_runs() {
    let spans = classify("abc123");
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].kind, ScriptKind::Latin);
    assert_eq!((spans[0].start, spans[0].end), (0, 3));
    assert_eq!(spans[1].kind, ScriptKind::Digit);
    assert_eq!((spans[1].start, spans[1].end), (3, 6));
}

#[test]
fn classify_buckets_arabic_and_whitespace() {
    let spans = classify("عربي ab");
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[0].kind, ScriptKind::Arabic);
    assert_eq!(spans[0].content, "عربي");
    assert_eq!(spans[1].kind, ScriptKind::Punctuation);
    assert_eq!(spans[2].kind, ScriptKind::Latin);
    assert_eq!(spans[2].content, "ab");
}

#[test]
fn ratios_exclude_whitespace_from_denominator() {
    let r = ratios("ab cd");
    assert!((r[&ScriptKind::Latin] - 1.0).abs() < f32::EPSILON);
}

#[test]
fn ratios_of_empty_text_are_all_zero() {
    let r = ratios("   ");
    for (_, v) in r {
        assert_eq!(v, 0.0);
    }
}

#[test]
fn known_signatures_are_removed_with_original_offsets() {
    let cleaner = default_cleaner();
    let result = cleaner.clean("السلام عليكمAUTO-TRANSLATE", Lang::Arabic);
    assert_eq!(result.cleaned_text, "السلام عليكم");
    assert_eq!(result.removed_spans.len(), 1);
    let span = &result.removed_spans[0];
    assert_eq!(span.content, "AUTO-TRANSLATE");
    assert_eq!((span.start, span.end), (23, 37));
    assert_eq!(result.actions_applied[0].pattern_id, "auto-translate-marker");
}

#[test]
fn offsets_stay_original_across_shrinking_passes() {
    let cleaner = default_cleaner();
    let result = cleaner.clean("محاميV2تحليلProقانون", Lang::Arabic);
    assert_eq!(result.cleaned_text, "محاميتحليلقانون");

    let v2 = &result.removed_spans[0];
    assert_eq!(v2.content, "V2");
    assert_eq!((v2.start, v2.end), (10, 12));

    // "Pro" is removed by the interleave pass after "V2" already shrank the
    // working text; its span must still point into the original input.
    let pro = &result.removed_spans[1];
    assert_eq!(pro.content, "Pro");
    assert_eq!((pro.start, pro.end), (22, 25));
    assert_eq!(pro.kind, ScriptKind::Latin);

    let ids: Vec<&str> = result
        .actions_applied
        .iter()
        .map(|a| a.pattern_id.as_str())
        .collect();
    assert_eq!(ids, vec!["version-marker", "script-interleave"]);
}

#[test]
fn mixed_ui_concatenation_scenario_is_cleaned() {
    let cleaner = default_cleaner();
    let result = cleaner.clean(
        "محامي دي زادمتصلمحاميProتحليلملفاتV2AUTO-TRANSLATE",
        Lang::Arabic,
    );
    assert!(!result.cleaned_text.contains("Pro"));
    assert!(!result.cleaned_text.contains("V2"));
    assert!(!result.cleaned_text.contains("AUTO-TRANSLATE"));

    let r = ratios(&result.cleaned_text);
    assert!(r[&ScriptKind::Arabic] >= 0.95);
    assert_eq!(r[&ScriptKind::Cyrillic], 0.0);
}

#[test]
fn cyrillic_and_english_fragments_scenario_is_cleaned() {
    let cleaner = default_cleaner();
    let result = cleaner.clean(
        "الشهود Defined في المادة 1 من قانون الإجراءات الجنائية ال процедة",
        Lang::Arabic,
    );
    assert!(!result.cleaned_text.contains("Defined"));
    assert!(result
        .cleaned_text
        .chars()
        .all(|c| !('\u{0400}'..='\u{052F}').contains(&c)));

    let r = ratios(&result.cleaned_text);
    assert!(r[&ScriptKind::Arabic] >= 0.95);

    let ids: Vec<&str> = result
        .actions_applied
        .iter()
        .map(|a| a.pattern_id.as_str())
        .collect();
    assert!(ids.contains(&"cyrillic-run"));
    assert!(ids.contains(&"english-fragment"));
}

#[test]
fn english_fragments_only_removed_next_to_arabic() {
    let cleaner = default_cleaner();
    // French target: the pass does not run at all.
    let result = cleaner.clean("Le contrat Defined est valide entre les parties", Lang::French);
    assert!(result.cleaned_text.contains("Defined"));
}

#[test]
fn cleaning_is_idempotent() {
    let cleaner = default_cleaner();
    let inputs = [
        "محامي دي زادمتصلمحاميProتحليلملفاتV2AUTO-TRANSLATE",
        "الشهود Defined في المادة 1 من قانون الإجراءات الجنائية ال процедة",
        "نص  فيه   فراغات \n\n\n\n متكررة",
        "Le présent contrat est conclu conformément au code civil.",
    ];
    for input in inputs {
        let once = cleaner.clean(input, Lang::Arabic);
        let twice = cleaner.clean(&once.cleaned_text, Lang::Arabic);
        assert_eq!(once.cleaned_text, twice.cleaned_text, "input: {input}");
        assert!(twice.removed_spans.is_empty(), "input: {input}");
    }
}

#[test]
fn confidence_steps_down_with_removed_fraction() {
    let cleaner = default_cleaner();

    let untouched = cleaner.clean("هذا نص عربي سليم تماما", Lang::Arabic);
    assert_eq!(untouched.confidence, 1.0);

    // 3 of 27 non-whitespace codepoints removed.
    let light = cleaner.clean("محامي ملفات قانونية إدارية Pro", Lang::Arabic);
    assert!(!light.cleaned_text.contains("Pro"));
    assert_eq!(light.confidence, 0.95);

    // 3 of 6 removed: half the input was contamination.
    let heavy = cleaner.clean("عقدPro", Lang::Arabic);
    assert_eq!(heavy.cleaned_text, "عقد");
    assert_eq!(heavy.confidence, 0.8);
}

#[test]
fn insert_separator_policy_keeps_minority_runs() {
    let cleaner = ContentCleaner::new(PatternLibrary::builtin(), InterleavePolicy::InsertSeparator);
    let result = cleaner.clean("عقدContrat", Lang::Arabic);
    assert_eq!(result.cleaned_text, "عقد Contrat");
    assert!(result.removed_spans.is_empty());
    assert_eq!(result.confidence, 1.0);
}

#[test]
fn replacement_characters_are_dropped_as_invalid_encoding() {
    let cleaner = default_cleaner();
    let result = cleaner.clean("نص قانوني\u{FFFD}\u{FFFD} متكامل وواضح", Lang::Arabic);
    assert!(!result.cleaned_text.contains('\u{FFFD}'));
    assert!(result
        .actions_applied
        .iter()
        .any(|a| a.pattern_id == "invalid-encoding"));
}

#[test]
fn whitespace_normalization_collapses_and_trims() {
    let cleaner = default_cleaner();
    let result = cleaner.clean("  المادة الأولى  :  تمهيد \n\n\n\n الفصل الثاني  ", Lang::Arabic);
    assert!(!result.cleaned_text.contains("  "));
    assert!(!result.cleaned_text.contains("\n\n\n"));
    assert!(!result.cleaned_text.starts_with(' '));
    assert!(!result.cleaned_text.ends_with(' '));
    assert!(!result.cleaned_text.contains(" :"));
}

#[test]
fn builtin_library_is_version_one() {
    assert_eq!(PatternLibrary::builtin().version(), 1);
}

#[test]
fn pattern_file_extends_builtin_signatures() {
    let path = std::env::temp_dir().join("saffi_pattern_file_test.json");
    std::fs::write(
        &path,
        r#"{"version":7,"patterns":[{"id":"legacy-banner","literal":"مسودة قديمة","action":"remove"}]}"#,
    )
    .unwrap();

    let library = PatternLibrary::load_from_file(&path).unwrap();
    assert_eq!(library.version(), 7);

    let cleaner = ContentCleaner::new(library, InterleavePolicy::DropMinority);
    let result = cleaner.clean("نص العقد مسودة قديمة النهائي المعتمد", Lang::Arabic);
    assert!(!result.cleaned_text.contains("مسودة قديمة"));
    // Built-in signatures still apply alongside the file's.
    let result = cleaner.clean("وثيقة نهائية معتمدة AUTO-TRANSLATE", Lang::Arabic);
    assert!(!result.cleaned_text.contains("AUTO-TRANSLATE"));

    std::fs::remove_file(&path).ok();
}
