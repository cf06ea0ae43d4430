/*!

This is the long-form manual for `survey_tally` and `surveytab`.

## The catalog

A catalog is the ordered list of questions shown by the wizard. Each question
has a unique `id`, a `text` and a `type`:

* `text` free-form text
* `date` a calendar date, entered as `YYYY-MM-DD`
* `number` a number
* `dropdown` exactly one option out of `options`
* `multiselect` any number of options out of `options`
* `group` a set of part questions listed in `subQuestions`

Any question may declare one `subQuestion`, an elaboration (usually free text)
asked right after its parent.

```json
{
  "id": "preferred_subjects",
  "text": "Which subjects do you prefer?",
  "type": "multiselect",
  "options": [
    { "value": "math", "label": "Mathematics" },
    { "value": "physics", "label": "Physics" }
  ],
  "subQuestion": { "id": "preferred_subjects_reason", "text": "Why?", "type": "text" }
}
```

## Tabulation

For every question that is not `text` or `date`, the analysis counts how many
times each value was recorded:

* a `dropdown` or `number` answer counts once;
* a `multiselect` answer counts once per selected option, and the total of the
  question grows by the number of selections;
* a `group` answer counts once per answered part, under the key `part:value`.

Percentages are relative to the total of the question and are rounded to two
decimals in the reports. A question nobody answered is still reported, with a
total of zero.

Answers that are missing are not counted, and text made only of spaces counts
as missing, the same way the wizard and the edit validation treat it. Answers
whose shape does not match the question (a list for a `dropdown`, a single
value for a `multiselect`) are ignored as if they were missing.

Sub-question answers are never tabulated.

## Attempts

An attempt is one submission of the whole catalog. It is stored with its id, its
number, the time it started (milliseconds since the Unix epoch) and its answers:

```json
{
  "attemptId": "0b5b3f40-5f8f-4a53-8d1e-a2f7b61c9a43",
  "attemptNumber": 3,
  "startTime": 1700000000000,
  "answers": {
    "repeat_year": { "value": "no" },
    "preferred_subjects": { "value": ["math"], "subQuestion": { "value": "I like it" } },
    "parents_interest": { "father_interest": { "value": "always" } }
  }
}
```

*/
